//! openFDA Sync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the openfda-sync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`SyncError`] taxonomy and [`Result`] alias
//! - **Logging**: tracing subscriber initialization driven by environment
//!   variables
//!
//! # Example
//!
//! ```no_run
//! use openfda_common::logging::{init_logging, LogConfig};
//! use openfda_common::{Result, SyncError};
//!
//! fn startup() -> Result<()> {
//!     let config = LogConfig::from_env();
//!     init_logging(&config).map_err(|e| SyncError::Config(e.to_string()))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SyncError};
