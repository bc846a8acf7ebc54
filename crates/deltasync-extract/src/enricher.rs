//! Detail lookup and envelope assembly

use crate::config::ExtractionJobConfig;
use crate::error::Result;
use crate::models::{IngestionEnvelope, RemoteUserDetail, RemoteUserSummary, UserRecord};
use crate::retry::RetryingCaller;
use tracing::debug;

pub const DETAIL_PATH: &str = "/api/jsonws/contact/get-contact";

/// Looks up the contact behind a listed user and builds its envelope
pub struct RecordEnricher {
    caller: RetryingCaller,
    detail_url: String,
    datasource_id: String,
}

impl RecordEnricher {
    pub fn new(config: &ExtractionJobConfig, caller: RetryingCaller) -> Self {
        Self {
            caller,
            detail_url: config.endpoint(DETAIL_PATH),
            datasource_id: config.datasource_id.clone(),
        }
    }

    /// One detail call for `summary`; `parsing_date` is the run's capture time
    pub async fn enrich(
        &self,
        summary: &RemoteUserSummary,
        parsing_date: i64,
    ) -> Result<IngestionEnvelope> {
        debug!(user_id = summary.user_id, contact_id = summary.contact_id, "Fetching contact");

        let body = self
            .caller
            .call(&self.detail_url, &[("contactId", summary.contact_id.to_string())])
            .await?;

        let detail = RemoteUserDetail::from_body(&body, &self.detail_url)?;
        let record = UserRecord::merge(summary, detail);

        IngestionEnvelope::new(&self.datasource_id, &record, parsing_date)
    }
}
