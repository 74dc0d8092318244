pub mod client;
pub mod common;
pub mod config;
pub mod input;

pub type Error = crate::common::error::RightsizeError;
pub type Result<T> = std::result::Result<T, Error>;

// Reexports
pub use tailor;

pub const RIGHTSIZE_VERSION: &str = {
    match option_env!("RIGHTSIZE_BUILD_VERSION") {
        Some(version) => version,
        None => env!("CARGO_PKG_VERSION"),
    }
};

/// Default name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rightsize.toml";
