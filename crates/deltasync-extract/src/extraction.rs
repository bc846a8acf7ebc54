//! The extraction algorithm
//!
//! [`Extraction`] walks the source collection page by page, filters each user
//! against the watermark, enriches the survivors and forwards them. It is a
//! plain async object with no task of its own; [`crate::worker`] runs it on a
//! tokio task.
//!
//! Failure policy:
//!
//! | fault                              | status | run      |
//! |------------------------------------|--------|----------|
//! | count / page request               | ERROR  | aborts   |
//! | detail request                     | ERROR  | per policy (aborts by default) |
//! | malformed detail or page row       | -      | record skipped |
//! | required field missing             | ERROR  | aborts   |
//! | ingestion delivery                 | ERROR  | per policy (continues by default) |
//! | cancellation                       | ERROR  | aborts   |

use crate::config::{ExtractionJobConfig, FailureAction};
use crate::enricher::RecordEnricher;
use crate::error::{ExtractError, Result};
use crate::filter::DeltaFilter;
use crate::forwarder::IngestionForwarder;
use crate::models::RemoteUserSummary;
use crate::pager::{OffsetPager, Pager};
use crate::retry::RetryingCaller;
use crate::status::{StatusCell, WorkerStatus};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Counters kept while a run progresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Total announced by the count endpoint at the start of the run
    pub total_reported: u64,
    pub examined: u64,
    pub filtered_out: u64,
    pub malformed_skipped: u64,
    pub enriched: u64,
    pub enrichment_failures: u32,
    pub forwarded: u64,
    pub delivery_failures: u32,
}

/// Outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub status: WorkerStatus,
    pub stats: ExtractionStats,
}

/// One extraction run for one tenant
pub struct Extraction {
    company_id: String,
    filter: DeltaFilter,
    pager: Box<dyn Pager>,
    enricher: RecordEnricher,
    forwarder: IngestionForwarder,
    detail_failure: FailureAction,
    delivery_failure: FailureAction,
    max_delivery_errors: Option<u32>,
    status: StatusCell,
    cancel: CancellationToken,
}

impl Extraction {
    pub fn new(config: &ExtractionJobConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_cancellation(config, transport, CancellationToken::new())
    }

    /// Build a run that stops when `cancel` fires
    pub fn with_cancellation(
        config: &ExtractionJobConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let upstream = |policy| {
            RetryingCaller::new(
                transport.clone(),
                Some(config.credentials.clone()),
                policy,
                cancel.clone(),
            )
        };

        let pager = OffsetPager::new(config, upstream(config.policies.listing));
        let enricher = RecordEnricher::new(config, upstream(config.policies.detail.retry));
        let forwarder = IngestionForwarder::new(
            config.ingestion_url.as_str(),
            RetryingCaller::new(
                transport.clone(),
                None,
                config.policies.ingestion.retry,
                cancel.clone(),
            ),
        );

        Ok(Self {
            company_id: config.company_id.clone(),
            filter: DeltaFilter::new(config.watermark),
            pager: Box::new(pager),
            enricher,
            forwarder,
            detail_failure: config.policies.detail.on_failure,
            delivery_failure: config.policies.ingestion.on_failure,
            max_delivery_errors: config.max_delivery_errors,
            status: StatusCell::new(),
            cancel,
        })
    }

    /// Replace the offset pager, e.g. with a cursor-based one
    pub fn with_pager(mut self, pager: Box<dyn Pager>) -> Self {
        self.pager = pager;
        self
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    /// Run to completion. Never fails; the outcome is in the report status.
    #[instrument(name = "extraction", skip(self), fields(company_id = %self.company_id))]
    pub async fn run(self) -> ExtractionReport {
        let mut stats = ExtractionStats::default();

        match self.extract(&mut stats).await {
            Ok(()) => {
                self.status.complete();
                info!(
                    status = %self.status.get(),
                    examined = stats.examined,
                    forwarded = stats.forwarded,
                    delivery_failures = stats.delivery_failures,
                    "Extraction ended, {} users extracted",
                    stats.forwarded
                );
            },
            Err(ExtractError::Cancelled) => {
                self.status.mark_error();
                warn!(examined = stats.examined, "Extraction cancelled");
            },
            Err(e) => {
                self.status.mark_error();
                error!(
                    error = %e,
                    examined = stats.examined,
                    forwarded = stats.forwarded,
                    "Extraction process aborted"
                );
            },
        }

        ExtractionReport {
            status: self.status.get(),
            stats,
        }
    }

    async fn extract(&self, stats: &mut ExtractionStats) -> Result<()> {
        let parsing_date = Utc::now().timestamp_millis();

        let total = self.pager.total_count().await?;
        stats.total_reported = total;
        info!(total, "Users found");
        info!(
            watermark = self.filter.watermark(),
            "Getting users modified after {}",
            format_watermark(self.filter.watermark())
        );

        let mut offset: u64 = 0;

        while offset < total {
            self.checkpoint()?;

            let page = self.pager.next_page(offset).await?;
            if page.is_empty() {
                warn!(offset, total, "Source returned an empty page before the reported total");
                break;
            }

            for entry in page {
                offset += 1;
                stats.examined += 1;
                debug!(position = offset, total, "Extracting user");

                // rows outside the delta are never expanded past the filter fields
                let summary = match entry.and_then(|listed| {
                    if self.filter.admits(&listed) {
                        listed.into_summary().map(Some)
                    } else {
                        Ok(None)
                    }
                }) {
                    Ok(Some(summary)) => summary,
                    Ok(None) => {
                        stats.filtered_out += 1;
                        continue;
                    },
                    Err(e) if e.is_record_local() => {
                        warn!(position = offset, error = %e, "Skipping unreadable user row");
                        stats.malformed_skipped += 1;
                        continue;
                    },
                    Err(e) => return Err(e),
                };

                self.process(&summary, parsing_date, stats).await?;
            }
        }

        Ok(())
    }

    /// Enrich and forward one admitted user
    async fn process(
        &self,
        summary: &RemoteUserSummary,
        parsing_date: i64,
        stats: &mut ExtractionStats,
    ) -> Result<()> {
        let envelope = match self.enricher.enrich(summary, parsing_date).await {
            Ok(envelope) => envelope,
            Err(e) if e.is_record_local() => {
                warn!(user_id = summary.user_id, error = %e, "Skipping user with unreadable contact");
                stats.malformed_skipped += 1;
                return Ok(());
            },
            Err(e @ ExtractError::Transport { .. })
                if self.detail_failure == FailureAction::RecordAndContinue =>
            {
                self.status.mark_error();
                stats.enrichment_failures += 1;
                error!(user_id = summary.user_id, error = %e, "Contact lookup failed, continuing");
                return Ok(());
            },
            Err(e) => return Err(e),
        };
        stats.enriched += 1;

        match self.forwarder.forward(&envelope).await {
            Ok(()) => {
                stats.forwarded += 1;
                Ok(())
            },
            Err(e @ ExtractError::IngestionDelivery { .. }) => {
                self.status.mark_error();
                stats.delivery_failures += 1;

                if self.delivery_failure == FailureAction::AbortRun {
                    return Err(e);
                }
                match self.max_delivery_errors {
                    Some(max) if stats.delivery_failures >= max => {
                        Err(ExtractError::TooManyDeliveryFailures {
                            count: stats.delivery_failures,
                        })
                    },
                    _ => Ok(()),
                }
            },
            Err(e) => Err(e),
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ExtractError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Watermark as a calendar date, e.g. `05-Mar-2024`
fn format_watermark(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%d-%b-%Y").to_string())
        .unwrap_or_else(|| millis.to_string())
}
