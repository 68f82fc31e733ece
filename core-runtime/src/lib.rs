//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the Drive transporter crates:
//! - Logging and tracing setup
//! - Endpoint and transport configuration
//!
//! Other workspace crates depend on this one for their `DriveConfig` and for
//! the logging conventions (`redact_if_sensitive`, `strip_path`).

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
