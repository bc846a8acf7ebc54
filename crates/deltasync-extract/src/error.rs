//! Error taxonomy for an extraction run
//!
//! Whether an error ends the run is decided by the caller, but two kinds are
//! always local to a single record: [`ExtractError::MalformedResponse`] skips
//! the record, everything else is escalated according to the call-site policy.

use deltasync_common::CommonError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Why a single HTTP attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server answered with HTTP {status}")]
    Status { status: u16 },

    #[error("connection failed: {0}")]
    Connection(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    /// All attempts allowed by the retry policy failed
    #[error("Request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: TransportFailure,
    },

    /// Body could not be decoded into the expected shape
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A field the merge step depends on is absent from the payload
    #[error("Required field '{field}' missing in {context}")]
    MissingField { field: String, context: String },

    /// Downstream ingestion refused or never received an envelope
    #[error("Delivery of content {content_id} failed: {source}")]
    IngestionDelivery {
        content_id: String,
        #[source]
        source: TransportFailure,
    },

    #[error("Aborting after {count} failed deliveries")]
    TooManyDeliveryFailures { count: u32 },

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] CommonError),
}

impl ExtractError {
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(CommonError::config(msg))
    }

    /// True when the error only concerns the record being processed
    pub fn is_record_local(&self) -> bool {
        matches!(self, ExtractError::MalformedResponse { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_only_malformed_is_record_local() {
        assert!(ExtractError::malformed("http://x", "not json").is_record_local());
        assert!(!ExtractError::missing_field("emailAddress", "contact 7").is_record_local());
        assert!(!ExtractError::Cancelled.is_record_local());
        assert!(!ExtractError::Transport {
            url: "http://x".into(),
            attempts: 10,
            source: TransportFailure::Status { status: 503 },
        }
        .is_record_local());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ExtractError::Transport {
            url: "http://portal/api/jsonws/user/get-company-users".into(),
            attempts: 3,
            source: TransportFailure::Timeout(Duration::from_secs(10)),
        };
        let msg = err.to_string();
        assert!(msg.contains("get-company-users"));
        assert!(msg.contains("3 attempt(s)"));

        let err = ExtractError::missing_field("emailAddress", "contact 12");
        assert_eq!(
            err.to_string(),
            "Required field 'emailAddress' missing in contact 12"
        );
    }
}
