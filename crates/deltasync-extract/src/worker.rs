//! Task wrapper around [`Extraction`]
//!
//! A worker is one independent run on its own tokio task. The supervisor
//! starts it, may poll [`WorkerHandle::status`] or cancel it, and finally joins
//! it to obtain the terminal status.

use crate::config::ExtractionJobConfig;
use crate::error::Result;
use crate::extraction::{Extraction, ExtractionReport, ExtractionStats};
use crate::status::WorkerStatus;
use crate::transport::{ReqwestTransport, Transport};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

/// A configured run that has not been started yet
pub struct ExtractionWorker {
    extraction: Extraction,
}

impl ExtractionWorker {
    pub fn new(extraction: Extraction) -> Self {
        Self { extraction }
    }

    /// Worker with its own HTTP client
    pub fn from_config(config: &ExtractionJobConfig, cancel: CancellationToken) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
        Ok(Self::new(Extraction::with_cancellation(config, transport, cancel)?))
    }

    pub fn status(&self) -> WorkerStatus {
        self.extraction.status()
    }

    /// Spawn the run on the current tokio runtime
    pub fn start(self) -> WorkerHandle {
        let company_id = self.extraction.company_id().to_string();
        let status = self.extraction.subscribe();
        let cancel = self.extraction.cancellation_token();

        info!(company_id = %company_id, "Starting extraction worker");
        let task = tokio::spawn(self.extraction.run().in_current_span());

        WorkerHandle {
            company_id,
            status,
            cancel,
            task,
        }
    }
}

/// A started worker
pub struct WorkerHandle {
    company_id: String,
    status: watch::Receiver<WorkerStatus>,
    cancel: CancellationToken,
    task: JoinHandle<ExtractionReport>,
}

impl WorkerHandle {
    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    /// Current status; RUNNING until the run reaches a terminal state
    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    /// Ask the run to stop at its next network call or backoff
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run and return its final status
    pub async fn join(self) -> WorkerStatus {
        self.join_report().await.status
    }

    /// Wait for the run and return status and counters
    pub async fn join_report(self) -> ExtractionReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!(company_id = %self.company_id, error = %e, "Extraction task did not finish");
                ExtractionReport {
                    status: WorkerStatus::Error,
                    stats: ExtractionStats::default(),
                }
            },
        }
    }
}
