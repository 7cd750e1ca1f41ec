//! Core utilities shared by every crate of the deferred renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timer
//! - Configuration loading

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
