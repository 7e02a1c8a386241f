pub mod config;
pub mod error;
pub mod types;

pub use config::TracingConfig;
pub use error::InteropError;
pub use types::*;
