//! Payloads exchanged with the source API and the ingestion endpoint
//!
//! Source payloads are decoded in two steps: first every required key must be
//! present (a missing key is a [`ExtractError::MissingField`]), then the typed
//! decode runs (a wrong type is a [`ExtractError::MalformedResponse`]).
//!
//! List rows are decoded lazily. [`ListedUser`] only needs what the delta
//! filter reads; the full [`RemoteUserSummary`] is required for admitted rows
//! only.

use crate::error::{ExtractError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the user list endpoint before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct ListedUser {
    /// Epoch millis
    pub modified_date: i64,
    /// 0 means active
    pub status: i64,
    row: Value,
    source: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    modified_date: i64,
    status: i64,
}

impl ListedUser {
    pub const FILTER_FIELDS: &'static [&'static str] = &["modifiedDate", "status"];

    pub fn from_value(row: Value, url: &str) -> Result<Self> {
        let activity: Activity = decode(&row, Self::FILTER_FIELDS, "user row", url)?;
        Ok(Self {
            modified_date: activity.modified_date,
            status: activity.status,
            row,
            source: url.to_string(),
        })
    }

    /// Full decode of an admitted row
    pub fn into_summary(self) -> Result<RemoteUserSummary> {
        RemoteUserSummary::from_value(self.row, &self.source)
    }
}

/// One row of the user list endpoint, fully decoded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserSummary {
    pub user_id: i64,
    pub screen_name: String,
    /// Epoch millis
    pub modified_date: i64,
    /// 0 means active
    pub status: i64,
    pub contact_id: i64,
}

impl RemoteUserSummary {
    pub const REQUIRED_FIELDS: &'static [&'static str] =
        &["userId", "screenName", "modifiedDate", "status", "contactId"];

    pub fn from_value(value: Value, url: &str) -> Result<Self> {
        decode(&value, Self::REQUIRED_FIELDS, "user summary", url)
    }
}

/// Contact record returned by the detail endpoint
///
/// Only the name parts are typed since the full name is derived from them;
/// the rest is passed through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserDetail {
    pub email_address: Value,
    pub employee_number: Value,
    pub job_title: Value,
    pub job_class: Value,
    pub male: Value,
    pub twitter_sn: Value,
    pub skype_sn: Value,
    pub facebook_sn: Value,
    pub first_name: String,
    pub middle_name: Value,
    pub last_name: String,
    pub birthday: Value,
}

impl RemoteUserDetail {
    pub const REQUIRED_FIELDS: &'static [&'static str] = &[
        "emailAddress",
        "employeeNumber",
        "jobTitle",
        "jobClass",
        "male",
        "twitterSn",
        "skypeSn",
        "facebookSn",
        "firstName",
        "middleName",
        "lastName",
        "birthday",
    ];

    /// Decode a detail body. Unparseable JSON is malformed, not missing.
    pub fn from_body(body: &str, url: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExtractError::malformed(url, format!("invalid JSON: {}", e)))?;
        decode(&value, Self::REQUIRED_FIELDS, "contact", url)
    }
}

/// Summary and detail merged into the shape indexed downstream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: i64,
    pub screen_name: String,
    pub email_address: Value,
    pub employee_number: Value,
    pub job_title: Value,
    pub job_class: Value,
    pub male: Value,
    pub twitter_sn: Value,
    pub skype_sn: Value,
    pub facebook_sn: Value,
    pub first_name: String,
    pub middle_name: Value,
    pub last_name: String,
    pub full_name: String,
    pub birthday: Value,
}

impl UserRecord {
    pub fn merge(summary: &RemoteUserSummary, detail: RemoteUserDetail) -> Self {
        let full_name = format!("{} {}", detail.first_name, detail.last_name);
        Self {
            user_id: summary.user_id,
            screen_name: summary.screen_name.clone(),
            email_address: detail.email_address,
            employee_number: detail.employee_number,
            job_title: detail.job_title,
            job_class: detail.job_class,
            male: detail.male,
            twitter_sn: detail.twitter_sn,
            skype_sn: detail.skype_sn,
            facebook_sn: detail.facebook_sn,
            first_name: detail.first_name,
            middle_name: detail.middle_name,
            last_name: detail.last_name,
            full_name,
            birthday: detail.birthday,
        }
    }
}

#[derive(Serialize)]
struct DatasourcePayload<'a> {
    user: &'a UserRecord,
}

/// Message posted to the ingestion endpoint for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionEnvelope {
    pub datasource_id: String,
    pub content_id: String,
    /// Epoch millis captured once at the start of the run
    pub parsing_date: i64,
    pub raw_content: String,
    /// JSON document `{"user": {...}}`
    pub datasource_payload: String,
}

impl IngestionEnvelope {
    pub fn new(datasource_id: &str, record: &UserRecord, parsing_date: i64) -> Result<Self> {
        Ok(Self {
            datasource_id: datasource_id.to_string(),
            content_id: record.user_id.to_string(),
            parsing_date,
            raw_content: record.full_name.clone(),
            datasource_payload: serde_json::to_string(&DatasourcePayload { user: record })?,
        })
    }

    /// Fields in the order the ingestion endpoint documents them
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("datasourceId", self.datasource_id.clone()),
            ("contentId", self.content_id.clone()),
            ("parsingDate", self.parsing_date.to_string()),
            ("rawContent", self.raw_content.clone()),
            ("datasourcePayload", self.datasource_payload.clone()),
        ]
    }
}

fn decode<T: DeserializeOwned>(
    value: &Value,
    required: &[&'static str],
    what: &str,
    url: &str,
) -> Result<T> {
    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::malformed(url, format!("{} is not a JSON object", what)))?;

    if let Some(field) = required.iter().find(|f| !object.contains_key(**f)) {
        return Err(ExtractError::missing_field(*field, format!("{} from {}", what, url)));
    }

    T::deserialize(value).map_err(|e| ExtractError::malformed(url, format!("{}: {}", what, e)))
}
