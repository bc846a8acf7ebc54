//! Bounded retry with a fixed delay
//!
//! Every failed attempt except the last is followed by the same pause; there is
//! no exponential backoff and no jitter. Cancellation is checked before each
//! attempt and interrupts the pause.

use crate::config::{Credentials, RetryPolicy};
use crate::error::{ExtractError, Result};
use crate::transport::{Form, FormRequest, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Performs one logical request against a [`Transport`]
#[derive(Clone)]
pub struct RetryingCaller {
    transport: Arc<dyn Transport>,
    credentials: Option<Credentials>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryingCaller {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Option<Credentials>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// POST `form` to `url`, returning the body of the first successful answer
    pub async fn call(&self, url: &str, form: &Form) -> Result<String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }

            let request = FormRequest {
                url,
                form,
                credentials: self.credentials.as_ref(),
                timeout: self.policy.timeout,
            };

            match self.transport.post_form(request).await {
                Ok(body) => {
                    if attempt > 1 {
                        debug!(url = %url, attempt, "Request succeeded after retry");
                    }
                    return Ok(body);
                },
                Err(failure) if attempt < max_attempts => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts,
                        error = %failure,
                        "Request failed, retrying in {:?}",
                        self.policy.delay
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
                        _ = tokio::time::sleep(self.policy.delay) => {},
                    }
                },
                Err(failure) => {
                    // single-attempt callers report the failure in their own terms
                    if max_attempts > 1 {
                        error!(
                            url = %url,
                            attempt,
                            max_attempts,
                            error = %failure,
                            "Request failed, no attempts left"
                        );
                    } else {
                        debug!(url = %url, error = %failure, "Request failed");
                    }
                    return Err(ExtractError::Transport {
                        url: url.to_string(),
                        attempts: attempt,
                        source: failure,
                    });
                },
            }
        }
    }
}
