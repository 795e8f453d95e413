//! `MANAGE_GIT_REPOSITORY` OData V2 models.
//!
//! Only the fields the clone step reads are modelled; unknown fields are
//! ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::service::traits::{LogEntry, Severity};

// ============================================================================
// Common OData wrapper types
// ============================================================================

/// OData V2 response wrapper (`{"d": ...}`).
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    /// Response payload. Missing when the system answered with something else.
    pub d: Option<T>,
}

/// OData V2 collection (`{"results": [...]}`).
#[derive(Debug, Deserialize)]
pub struct Results<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Default for Results<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

/// OData error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorResponse {
    pub error: ODataError,
}

#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub code: Option<String>,
    pub message: Option<ODataErrorMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ODataErrorMessage {
    pub value: Option<String>,
}

/// Service document (`?$format=json`).
#[derive(Debug, Default, Deserialize)]
pub struct ServiceDocument {
    #[serde(rename = "EntitySets", default)]
    pub entity_sets: Vec<String>,
}

// ============================================================================
// Clone / Pull entities
// ============================================================================

/// Body sent to the `Clones` entity set.
#[derive(Debug, Serialize)]
pub struct CloneBody {
    pub sc_name: String,
    pub branch_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
}

/// `Clones` entity returned after triggering a clone.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CloneEntity {
    pub uuid: Option<String>,
    pub sc_name: Option<String>,
    pub branch_name: Option<String>,
    pub import_type: Option<String>,
    pub namespace: Option<String>,
    pub status: Option<String>,
    pub status_descr: Option<String>,
    pub user_name: Option<String>,
    pub start_time: Option<String>,
    pub change_time: Option<String>,
}

impl CloneEntity {
    /// True when the system returned an entity without any known field.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `Pull` entity used for polling and log retrieval.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PullEntity {
    pub uuid: Option<String>,
    pub sc_name: Option<String>,
    pub namespace: Option<String>,
    pub status: Option<String>,
    pub status_descr: Option<String>,
    #[serde(rename = "to_Execution_log")]
    pub to_execution_log: Option<Results<ExecutionLogRow>>,
    #[serde(rename = "to_Log_Overview")]
    pub to_log_overview: Option<Results<LogOverviewRow>>,
}

impl PullEntity {
    /// True when no field the poll loop relies on is present.
    pub fn is_empty(&self) -> bool {
        self.uuid.is_none()
            && self.sc_name.is_none()
            && self.namespace.is_none()
            && self.status.is_none()
            && self.status_descr.is_none()
            && self.to_execution_log.is_none()
            && self.to_log_overview.is_none()
    }
}

// ============================================================================
// Log types
// ============================================================================

/// Row of `to_Execution_log`.
#[derive(Debug, Deserialize)]
pub struct ExecutionLogRow {
    #[serde(default, deserialize_with = "index_from_any")]
    pub index_no: u32,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<&ExecutionLogRow> for LogEntry {
    fn from(row: &ExecutionLogRow) -> Self {
        Self {
            index: row.index_no,
            severity: Severity::from_type(&row.entry_type),
            description: row.descr.clone(),
            timestamp: row.timestamp.as_deref().and_then(parse_odata_date),
        }
    }
}

/// Row of `to_Log_Overview`.
#[derive(Debug, Deserialize)]
pub struct LogOverviewRow {
    #[serde(default, deserialize_with = "index_from_any")]
    pub log_index: u32,
    #[serde(default)]
    pub log_name: String,
    #[serde(default)]
    pub type_of_found_issues: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "to_Log_Protocol", default)]
    pub to_log_protocol: Results<LogProtocolRow>,
}

/// Row of `to_Log_Protocol`.
#[derive(Debug, Deserialize)]
pub struct LogProtocolRow {
    #[serde(default, deserialize_with = "index_from_any")]
    pub log_index: u32,
    #[serde(default, deserialize_with = "index_from_any")]
    pub index_no: u32,
    #[serde(default)]
    pub log_name: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub criticality: i32,
}

/// Indices arrive as JSON numbers in some entity sets and as strings in others.
///
/// A missing or malformed index sorts first instead of discarding the whole log.
fn index_from_any<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(index.unwrap_or(0))
}

/// Parse an OData V2 JSON date such as `/Date(1644332299000+0000)/`.
///
/// The millisecond part is UTC; the offset suffix is informational.
pub fn parse_odata_date(value: &str) -> Option<DateTime<Utc>> {
    let inner = value.trim().strip_prefix("/Date(")?.strip_suffix(")/")?;
    let (sign, digits) = match inner.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, inner),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let millis: i64 = digits[..end].parse().ok()?;
    DateTime::<Utc>::from_timestamp_millis(sign * millis)
}
