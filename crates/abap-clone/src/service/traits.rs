//! Git repository service trait and common types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the ABAP system.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response did not carry the entity we asked for.
    #[error("Request to ABAP System not successful")]
    EmptyResponse,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A request to clone one repository / software component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneRequest {
    /// Software component name (e.g. `/DMO/REPO_A`).
    pub repository_name: String,
    /// Branch to clone.
    pub branch_name: String,
    /// Commit to check out. Takes precedence over `tag`.
    pub commit_id: Option<String>,
    /// Tag to check out when no commit is given.
    pub tag: Option<String>,
}

impl CloneRequest {
    /// Create a request for the head of `branch_name`.
    pub fn new(repository_name: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            branch_name: branch_name.into(),
            commit_id: None,
            tag: None,
        }
    }

    /// Pin the request to a commit. Empty strings are ignored.
    #[must_use]
    pub fn with_commit(mut self, commit_id: impl Into<String>) -> Self {
        self.commit_id = non_empty(commit_id.into());
        self
    }

    /// Pin the request to a tag. Empty strings are ignored.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = non_empty(tag.into());
        self
    }

    /// Human-readable description used in log lines and error messages.
    ///
    /// ```text
    /// repository / software component '/DMO/REPO_A', branch 'main', commit 'ABCD1234'
    /// ```
    pub fn describe(&self) -> String {
        let mut description = format!(
            "repository / software component '{}', branch '{}'",
            self.repository_name, self.branch_name
        );
        if let Some(commit) = &self.commit_id {
            description.push_str(&format!(", commit '{commit}'"));
        } else if let Some(tag) = &self.tag {
            description.push_str(&format!(", tag '{tag}'"));
        }
        description
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reference to a running clone that can be polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// UUID of the pull entity created by the clone.
    pub uuid: String,
    /// Absolute URL of the pull entity.
    pub url: String,
}

/// Status of a clone as reported by the poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// `R` - still running.
    Running,
    /// `S` - finished successfully.
    Success,
    /// `E` - finished with errors.
    Error,
    /// Anything else. Treated as a failed terminal state.
    Unknown(String),
}

impl PollStatus {
    /// Map the single-letter status code of the pull entity.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "R" => Self::Running,
            "S" => Self::Success,
            "E" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether polling should stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether the status alone makes the clone a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Unknown(_))
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Parse the `type` / `type_of_found_issues` values used by the service.
    pub fn from_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" | "e" | "aborted" | "abort" | "a" => Self::Error,
            "warning" | "w" => Self::Warning,
            "success" | "s" => Self::Success,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single entry of the execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position within its log.
    pub index: u32,
    /// Severity derived from the entry type.
    pub severity: Severity,
    /// Message text.
    pub description: String,
    /// When the entry was written, if reported.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Log produced by the ABAP system for a finished clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Entries in log order.
    pub entries: Vec<LogEntry>,
}

impl ExecutionLog {
    /// Build a log, ordering entries by index. Entries with equal index keep
    /// their relative order.
    pub fn new(mut entries: Vec<LogEntry>) -> Self {
        entries.sort_by_key(|entry| entry.index);
        Self { entries }
    }

    /// Most severe entry type present, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|entry| entry.severity).max()
    }

    /// Whether any entry reports an error.
    pub fn has_errors(&self) -> bool {
        self.worst_severity() == Some(Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append the entries of `other` after the entries of this log.
    pub fn extend(&mut self, other: ExecutionLog) {
        self.entries.extend(other.entries);
    }
}

/// The capability the clone orchestrator needs from an ABAP system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitRepositoryService: Send + Sync {
    /// Trigger a clone and return a reference that can be polled.
    async fn submit(&self, request: &CloneRequest) -> Result<ResourceRef, ServiceError>;

    /// Read the current status of a clone.
    async fn poll(&self, resource: &ResourceRef) -> Result<PollStatus, ServiceError>;

    /// Fetch the log of a finished clone.
    async fn fetch_log(&self, resource: &ResourceRef) -> Result<ExecutionLog, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, severity: Severity) -> LogEntry {
        LogEntry {
            index,
            severity,
            description: format!("entry {index}"),
            timestamp: None,
        }
    }

    #[test]
    fn test_poll_status_codes() {
        assert_eq!(PollStatus::from_code("R"), PollStatus::Running);
        assert_eq!(PollStatus::from_code("S"), PollStatus::Success);
        assert_eq!(PollStatus::from_code("E"), PollStatus::Error);
        assert_eq!(
            PollStatus::from_code("Q"),
            PollStatus::Unknown("Q".to_string())
        );
        assert!(!PollStatus::Running.is_terminal());
        assert!(PollStatus::Unknown(String::new()).is_failure());
        assert!(!PollStatus::Success.is_failure());
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::from_type("Error"), Severity::Error);
        assert_eq!(Severity::from_type("E"), Severity::Error);
        assert_eq!(Severity::from_type("Warning"), Severity::Warning);
        assert_eq!(Severity::from_type("Success"), Severity::Success);
        assert_eq!(Severity::from_type("Info"), Severity::Info);
        assert_eq!(Severity::from_type("LogEntry"), Severity::Info);
        assert!(Severity::Error > Severity::Warning);
    }

    #[test]
    fn test_execution_log_worst_severity() {
        let log = ExecutionLog::new(vec![
            entry(3, Severity::Warning),
            entry(1, Severity::Info),
            entry(2, Severity::Success),
        ]);
        assert_eq!(log.worst_severity(), Some(Severity::Warning));
        assert!(!log.has_errors());
        let indices: Vec<u32> = log.entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        assert_eq!(ExecutionLog::default().worst_severity(), None);
    }

    #[test]
    fn test_describe_prefers_commit_over_tag() {
        let request = CloneRequest::new("/DMO/REPO_A", "branchA")
            .with_tag("v-1.0.1")
            .with_commit("ABCD1234");
        assert_eq!(
            request.describe(),
            "repository / software component '/DMO/REPO_A', branch 'branchA', commit 'ABCD1234'"
        );

        let tagged = CloneRequest::new("/DMO/REPO_A", "branchA").with_tag("v-1.0.1");
        assert_eq!(
            tagged.describe(),
            "repository / software component '/DMO/REPO_A', branch 'branchA', tag 'v-1.0.1'"
        );

        let plain = CloneRequest::new("testRepo1", "testBranch1").with_commit("  ");
        assert_eq!(plain.commit_id, None);
        assert_eq!(
            plain.describe(),
            "repository / software component 'testRepo1', branch 'testBranch1'"
        );
    }
}
