//! HTTP transport seam
//!
//! Every outbound call goes through [`Transport::post_form`], one attempt per
//! call. Retrying is layered on top by [`crate::retry::RetryingCaller`].

use crate::config::Credentials;
use crate::error::{ExtractError, Result, TransportFailure};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("deltasync-extract/", env!("CARGO_PKG_VERSION"));

/// Form fields of one request, in wire order
pub type Form = [(&'static str, String)];

/// A single form-encoded POST
#[derive(Debug, Clone, Copy)]
pub struct FormRequest<'a> {
    pub url: &'a str,
    pub form: &'a Form,
    pub credentials: Option<&'a Credentials>,
    pub timeout: Duration,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt. Any non-2xx answer is a failure.
    async fn post_form(&self, request: FormRequest<'_>) -> std::result::Result<String, TransportFailure>;
}

/// Production transport backed by a pooled reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(&self, request: FormRequest<'_>) -> std::result::Result<String, TransportFailure> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportFailure::Timeout(request.timeout)
            } else {
                TransportFailure::Connection(e.to_string())
            }
        };

        let mut builder = self
            .client
            .post(request.url)
            .timeout(request.timeout)
            .form(request.form);

        if let Some(credentials) = request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportFailure::Status {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(classify)
    }
}
