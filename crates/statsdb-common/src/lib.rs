//! statsdb common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient pieces shared by the statsdb workspace members.
//!
//! - **Logging**: one place to configure `tracing` output for the ingestion
//!   binary, its tests and the xtask tooling
//!
//! # Example
//!
//! ```no_run
//! use statsdb_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod logging;

pub use logging::{init_logging, LogConfig, LogGuard};
