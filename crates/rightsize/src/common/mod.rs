pub mod cli;
pub mod error;
pub mod format;
pub mod parser;
pub mod setup;
pub mod utils;
