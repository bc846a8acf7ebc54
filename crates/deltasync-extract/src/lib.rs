//! deltasync extraction library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental extraction of portal users into an ingestion endpoint.
//!
//! A run counts the users of one tenant, walks them page by page, keeps those
//! modified after a watermark, looks up each survivor's contact record and
//! posts the merged user to the ingestion endpoint.
//!
//! # Components
//!
//! - [`retry::RetryingCaller`]: bounded retry with a fixed delay over a [`transport::Transport`]
//! - [`pager::Pager`]: count-then-offset pagination
//! - [`enricher::RecordEnricher`]: contact lookup and envelope assembly
//! - [`forwarder::IngestionForwarder`]: single-attempt delivery
//! - [`extraction::Extraction`]: the run itself, with its [`status::WorkerStatus`]
//! - [`worker::ExtractionWorker`]: runs an extraction on a tokio task
//!
//! # Example
//!
//! ```no_run
//! use deltasync_extract::{ExtractionJobConfig, ExtractionWorker};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ExtractionJobConfig::new(
//!         "https://portal.example.com",
//!         "admin",
//!         "secret",
//!         1_700_000_000_000,
//!         "20097",
//!         "4",
//!         "http://ingestion:8080/v1/ingestion/",
//!     )?;
//!
//!     let handle = ExtractionWorker::from_config(&config, CancellationToken::new())?.start();
//!     let status = handle.join().await;
//!     tracing::info!(%status, "Extraction finished");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enricher;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod forwarder;
pub mod models;
pub mod pager;
pub mod retry;
pub mod status;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{CallPolicies, CallPolicy, ExtractionJobConfig, FailureAction, RetryPolicy};
pub use error::{ExtractError, Result};
pub use extraction::{Extraction, ExtractionReport, ExtractionStats};
pub use status::WorkerStatus;
pub use worker::{ExtractionWorker, WorkerHandle};
