//! Configuration for the disclosure orchestration.
//!
//! Layered the 12-factor way:
//! 1. Defaults (from code)
//! 2. Config file (disclosure.toml)
//! 3. Environment variables (DISCLOSURE_* prefix, `__` for nesting)
//!
//! # Example
//!
//! ```no_run
//! use scanner_disclosure::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_file("./disclosure.toml")
//!     .load()
//!     .expect("Failed to load config");
//! assert!(config.timing.failsafe_ms >= config.timing.analyzing_delay_ms);
//! ```
pub mod error;
pub mod loader;

pub use error::{ConfigError, Result};
pub use loader::{AttachConfig, ConfigLoader, DisclosureConfig, TimingConfig};
