pub mod analyze;
pub mod config;
pub mod escalate;
pub mod plan;
