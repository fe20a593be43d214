//! Telemetry: structured logging setup.
//!
//! Errors are additionally counted through the `metrics` facade
//! (`rbac_errors_total`); installing a recorder is left to the host.
//!
//! # Example
//!
//! ```rust,no_run
//! use rbac_core::telemetry::{init_logging, LoggingConfig};
//!
//! init_logging(&LoggingConfig::default()).expect("Failed to initialize logging");
//! ```

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
