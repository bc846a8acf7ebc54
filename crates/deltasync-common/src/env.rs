//! Environment variable helpers
//!
//! Empty values are treated as unset so that a blank line in a `.env` file
//! does not override a default.

use crate::error::{CommonError, Result};
use std::fmt::Display;
use std::str::FromStr;
use url::Url;

/// Read a variable, ignoring unset and blank values
pub fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable
pub fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match var(key) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| CommonError::InvalidEnv {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            }),
    }
}

/// Parse an absolute http(s) URL
pub fn parse_http_url(value: &str) -> Result<Url> {
    let url = Url::parse(value).map_err(|source| CommonError::InvalidUrl {
        value: value.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CommonError::config(format!(
            "Unsupported scheme '{}' in '{}', expected http or https",
            other, value
        ))),
    }
}
