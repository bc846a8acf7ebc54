//! Extraction job configuration
//!
//! A [`ExtractionJobConfig`] is built once per worker and never mutated. The
//! retry and failure behaviour of every outbound call site lives in
//! [`CallPolicies`], so the difference between upstream calls (retried, fatal)
//! and ingestion calls (single attempt, tolerated) is plain configuration.

use crate::error::{ExtractError, Result};
use deltasync_common::env::parse_http_url;
use std::time::Duration;
use url::Url;

// ============================================================================
// Defaults
// ============================================================================

/// Attempts made by a retrying call before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fixed pause between two attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Per-attempt timeout for upstream calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Timeout of the single ingestion POST, in seconds.
pub const DEFAULT_INGESTION_TIMEOUT_SECS: u64 = 10;

/// Bounded retry with a constant delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            timeout,
        }
    }

    /// One attempt, no retry
    pub const fn single_attempt(timeout: Duration) -> Self {
        Self::fixed(1, Duration::ZERO, timeout)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }
}

/// What the run does once a call site has exhausted its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Mark the run as failed and stop
    AbortRun,
    /// Mark the run as failed and move on to the next record
    RecordAndContinue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub retry: RetryPolicy,
    pub on_failure: FailureAction,
}

/// Policies for each outbound call site
///
/// Count and page requests have no failure action: the cursor cannot move past
/// a page that was never read, so those failures always end the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicies {
    pub listing: RetryPolicy,
    pub detail: CallPolicy,
    pub ingestion: CallPolicy,
}

impl CallPolicies {
    /// Same retry policy for every upstream call, defaults for ingestion
    pub fn with_upstream_retry(retry: RetryPolicy) -> Self {
        Self {
            listing: retry,
            detail: CallPolicy {
                retry,
                on_failure: FailureAction::AbortRun,
            },
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        for (site, retry) in [
            ("listing", &self.listing),
            ("detail", &self.detail.retry),
            ("ingestion", &self.ingestion.retry),
        ] {
            if retry.max_attempts == 0 {
                return Err(ExtractError::config(format!(
                    "{} call site needs at least one attempt",
                    site
                )));
            }
            if retry.timeout.is_zero() {
                return Err(ExtractError::config(format!(
                    "{} call site needs a non-zero timeout",
                    site
                )));
            }
        }
        Ok(())
    }
}

impl Default for CallPolicies {
    fn default() -> Self {
        Self {
            listing: RetryPolicy::default(),
            detail: CallPolicy {
                retry: RetryPolicy::default(),
                on_failure: FailureAction::AbortRun,
            },
            ingestion: CallPolicy {
                retry: RetryPolicy::single_attempt(Duration::from_secs(
                    DEFAULT_INGESTION_TIMEOUT_SECS,
                )),
                on_failure: FailureAction::RecordAndContinue,
            },
        }
    }
}

/// HTTP basic credentials for the source API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything one extraction run needs to know
#[derive(Debug, Clone)]
pub struct ExtractionJobConfig {
    /// Root of the source portal, e.g. `https://portal.example.com`
    pub base_url: Url,
    pub credentials: Credentials,
    /// Epoch millis; only users modified strictly after it are extracted
    pub watermark: i64,
    /// Tenant (company) every source call is scoped to
    pub company_id: String,
    pub datasource_id: String,
    pub ingestion_url: Url,
    pub policies: CallPolicies,
    /// Abort once this many deliveries have failed. `None` never aborts.
    pub max_delivery_errors: Option<u32>,
}

impl ExtractionJobConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        watermark: i64,
        company_id: impl Into<String>,
        datasource_id: impl Into<String>,
        ingestion_url: &str,
    ) -> Result<Self> {
        let config = Self {
            base_url: parse_http_url(domain)?,
            credentials: Credentials::new(username, password),
            watermark,
            company_id: company_id.into(),
            datasource_id: datasource_id.into(),
            ingestion_url: parse_http_url(ingestion_url)?,
            policies: CallPolicies::default(),
            max_delivery_errors: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_policies(mut self, policies: CallPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_max_delivery_errors(mut self, max: Option<u32>) -> Self {
        self.max_delivery_errors = max;
        self
    }

    /// Same job for another tenant
    pub fn for_company(&self, company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.company_id.trim().is_empty() {
            return Err(ExtractError::config("company id must not be empty"));
        }
        if self.datasource_id.trim().is_empty() {
            return Err(ExtractError::config("datasource id must not be empty"));
        }
        if self.credentials.username.is_empty() {
            return Err(ExtractError::config("username must not be empty"));
        }
        if self.max_delivery_errors == Some(0) {
            return Err(ExtractError::config(
                "max delivery errors must be at least 1 when set",
            ));
        }
        self.policies.validate()
    }

    /// Absolute URL of a source API path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> ExtractionJobConfig {
        ExtractionJobConfig::new(
            "https://portal.example.com",
            "admin",
            "secret",
            1_000,
            "20097",
            "4",
            "http://ingestion:8080/v1/ingestion/",
        )
        .unwrap()
    }

    #[test]
    fn test_default_policies() {
        let policies = CallPolicies::default();
        assert_eq!(policies.listing.max_attempts, 10);
        assert_eq!(policies.listing.delay, Duration::from_secs(10));
        assert_eq!(policies.detail.on_failure, FailureAction::AbortRun);
        assert_eq!(policies.ingestion.retry.max_attempts, 1);
        assert_eq!(policies.ingestion.retry.timeout, Duration::from_secs(10));
        assert_eq!(
            policies.ingestion.on_failure,
            FailureAction::RecordAndContinue
        );
    }

    #[test]
    fn test_endpoint_joins_path_under_base() {
        let config = config();
        assert_eq!(
            config.endpoint("/api/jsonws/user/get-company-users"),
            "https://portal.example.com/api/jsonws/user/get-company-users"
        );

        let mut nested = config.clone();
        nested.base_url = Url::parse("https://example.com/portal/").unwrap();
        assert_eq!(
            nested.endpoint("/api/jsonws/contact/get-contact"),
            "https://example.com/portal/api/jsonws/contact/get-contact"
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(ExtractionJobConfig::new("portal", "a", "b", 0, "1", "2", "http://i").is_err());
        assert!(ExtractionJobConfig::new("http://p", "a", "b", 0, " ", "2", "http://i").is_err());

        let zero_attempts = config().with_policies(CallPolicies::with_upstream_retry(
            RetryPolicy::fixed(0, Duration::ZERO, Duration::from_secs(1)),
        ));
        assert!(zero_attempts.validate().is_err());

        assert!(config().with_max_delivery_errors(Some(0)).validate().is_err());
    }

    #[test]
    fn test_for_company_keeps_everything_else() {
        let other = config().for_company("30001");
        assert_eq!(other.company_id, "30001");
        assert_eq!(other.watermark, 1_000);
        assert_eq!(other.datasource_id, "4");
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
