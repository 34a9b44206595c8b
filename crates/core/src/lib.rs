pub mod config;
pub mod errors;
pub mod options;

pub use self::config::*;
pub use errors::*;
pub use options::ConfigurationOptions;
