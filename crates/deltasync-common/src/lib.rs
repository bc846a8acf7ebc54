//! deltasync common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the deltasync workspace members:
//!
//! - **Error Handling**: configuration error type and result alias
//! - **Environment**: typed lookups of environment variables
//! - **Logging**: tracing subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use deltasync_common::env;
//! use deltasync_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let watermark: Option<i64> = env::parse_var("DELTASYNC_WATERMARK")?;
//!     tracing::info!(?watermark, "configured");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
