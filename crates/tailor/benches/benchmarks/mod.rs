pub mod analysis;
pub mod sizing;
