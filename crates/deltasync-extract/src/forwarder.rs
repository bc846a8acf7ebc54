//! Delivery of envelopes to the ingestion endpoint
//!
//! One POST per envelope. The call goes through the ingestion call-site policy,
//! which by default allows a single attempt: a downstream failure is reported
//! for that record only and never stalls the extraction with retries.

use crate::error::{ExtractError, Result};
use crate::models::IngestionEnvelope;
use crate::retry::RetryingCaller;
use tracing::{debug, error};

pub struct IngestionForwarder {
    caller: RetryingCaller,
    url: String,
}

impl IngestionForwarder {
    pub fn new(url: impl Into<String>, caller: RetryingCaller) -> Self {
        Self {
            caller,
            url: url.into(),
        }
    }

    pub async fn forward(&self, envelope: &IngestionEnvelope) -> Result<()> {
        match self.caller.call(&self.url, &envelope.form_fields()).await {
            Ok(_) => {
                debug!(content_id = %envelope.content_id, "Envelope delivered");
                Ok(())
            },
            Err(ExtractError::Transport { source, .. }) => {
                error!(
                    content_id = %envelope.content_id,
                    url = %self.url,
                    error = %source,
                    "Problems during delivery of user"
                );
                Err(ExtractError::IngestionDelivery {
                    content_id: envelope.content_id.clone(),
                    source,
                })
            },
            Err(other) => Err(other),
        }
    }
}
