//! Offset pagination over the user list
//!
//! The total is read once per run and the caller walks offsets up to it. The
//! source collection may change between page requests, so offsets can drift
//! against the total; [`Pager`] keeps that policy replaceable by a pager built
//! on stable continuation tokens.

use crate::config::ExtractionJobConfig;
use crate::error::{ExtractError, Result};
use crate::models::ListedUser;
use crate::retry::RetryingCaller;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub const COUNT_PATH: &str = "/api/jsonws/user/get-company-users-count";
pub const LIST_PATH: &str = "/api/jsonws/user/get-company-users";

/// Records requested per page
pub const PAGE_WINDOW: u64 = 200;

/// One decoded row of a page.
///
/// Rows are decoded individually so that a bad row only costs that record;
/// the caller still counts it when advancing the offset.
pub type PageEntry = Result<ListedUser>;

#[async_trait]
pub trait Pager: Send + Sync {
    /// Number of users in the tenant, fetched once at the start of a run
    async fn total_count(&self) -> Result<u64>;

    /// Up to one window of users starting at `offset`, in source order
    async fn next_page(&self, offset: u64) -> Result<Vec<PageEntry>>;
}

/// [`Pager`] over the `get-company-users` JSON web services
pub struct OffsetPager {
    caller: RetryingCaller,
    count_url: String,
    list_url: String,
    company_id: String,
}

impl OffsetPager {
    pub fn new(config: &ExtractionJobConfig, caller: RetryingCaller) -> Self {
        Self {
            caller,
            count_url: config.endpoint(COUNT_PATH),
            list_url: config.endpoint(LIST_PATH),
            company_id: config.company_id.clone(),
        }
    }
}

#[async_trait]
impl Pager for OffsetPager {
    async fn total_count(&self) -> Result<u64> {
        let body = self
            .caller
            .call(&self.count_url, &[("companyId", self.company_id.clone())])
            .await?;

        parse_count(&body).ok_or_else(|| {
            ExtractError::malformed(&self.count_url, format!("not a user count: {:?}", body))
        })
    }

    async fn next_page(&self, offset: u64) -> Result<Vec<PageEntry>> {
        let end = offset + PAGE_WINDOW;
        debug!(offset, end, "Requesting user page");

        let body = self
            .caller
            .call(
                &self.list_url,
                &[
                    ("companyId", self.company_id.clone()),
                    ("start", offset.to_string()),
                    ("end", end.to_string()),
                ],
            )
            .await?;

        let rows: Vec<Value> = serde_json::from_str(&body).map_err(|e| {
            ExtractError::malformed(
                &self.list_url,
                format!("page {}..{} is not a JSON array: {}", offset, end, e),
            )
        })?;

        Ok(rows
            .into_iter()
            .map(|row| ListedUser::from_value(row, &self.list_url))
            .collect())
    }
}

/// The count arrives either as a bare number or as a quoted decimal string
fn parse_count(body: &str) -> Option<u64> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Number(n)) => n.as_u64(),
        Ok(Value::String(s)) => s.trim().parse().ok(),
        Ok(_) => None,
        Err(_) => body.trim().parse().ok(),
    }
}
