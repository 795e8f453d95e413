//! Clone orchestration: submit, poll, fetch logs, classify.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::PollSettings;
use crate::manifest::{ManifestError, RepositorySelection, resolve_repositories};
use crate::service::{
    CloneRequest, ExecutionLog, GitRepositoryService, PollStatus, ResourceRef, ServiceError,
    Severity,
};

/// Separator logged around each repository.
const SEPARATOR: &str = "--------------------------------------------------------------------------------";

/// Errors that end a clone run.
#[derive(Error, Debug)]
pub enum CloneError {
    /// Talking to the ABAP system failed before a verdict was reached.
    #[error("Clone of {description} failed on the ABAP system: {source}")]
    Request {
        description: String,
        #[source]
        source: ServiceError,
    },

    /// The clone was still running when the poll budget ran out.
    #[error(
        "Clone of {description} failed on the ABAP system: still running after {attempts} status polls"
    )]
    PollTimeout { description: String, attempts: u32 },

    /// The ABAP system reported the clone as failed.
    #[error("{0}")]
    Failed(String),

    /// The list of repositories could not be determined.
    #[error("Something failed during the clone: {0}")]
    Repositories(#[from] ManifestError),
}

/// Verdict for a single repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Success,
    Failure { message: String },
}

impl CloneOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Drives clones against a [`GitRepositoryService`], one repository at a time.
pub struct CloneOrchestrator<S> {
    service: S,
    poll: PollSettings,
}

impl<S: GitRepositoryService> CloneOrchestrator<S> {
    pub fn new(service: S, poll: PollSettings) -> Self {
        Self { service, poll }
    }

    /// Clone one repository and classify the result.
    ///
    /// Transport problems are returned as [`CloneError`]; a clone the system
    /// reports as failed is a [`CloneOutcome::Failure`].
    ///
    /// # Errors
    /// Returns error if the clone cannot be triggered or polled.
    pub async fn clone_repository(
        &self,
        request: &CloneRequest,
    ) -> Result<CloneOutcome, CloneError> {
        let description = request.describe();

        let resource = self
            .service
            .submit(request)
            .await
            .map_err(|source| CloneError::Request {
                description: description.clone(),
                source,
            })?;
        debug!(uuid = %resource.uuid, url = %resource.url, "Clone triggered");

        let status = self.wait_for_completion(&resource, &description).await?;
        let log = self.fetch_log(&resource).await;
        report_log(&log);

        if status.is_failure() || log.has_errors() {
            let message = format!("Clone of {description} failed on the ABAP System");
            error!(
                repository = %request.repository_name,
                branch = %request.branch_name,
                commit = ?request.commit_id,
                status = %status,
                worst_severity = ?log.worst_severity(),
                "{message}"
            );
            return Ok(CloneOutcome::Failure { message });
        }

        info!("The {description} was cloned successfully");
        Ok(CloneOutcome::Success)
    }

    /// Poll until the clone leaves the running state or the budget is spent.
    async fn wait_for_completion(
        &self,
        resource: &ResourceRef,
        description: &str,
    ) -> Result<PollStatus, CloneError> {
        info!("Start polling the status...");

        let max_attempts = self.poll.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let status =
                self.service
                    .poll(resource)
                    .await
                    .map_err(|source| CloneError::Request {
                        description: description.to_string(),
                        source,
                    })?;

            debug!(uuid = %resource.uuid, attempt, status = %status, "Polled clone status");

            if status.is_terminal() {
                return Ok(status);
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.poll.interval).await;
            }
        }

        Err(CloneError::PollTimeout {
            description: description.to_string(),
            attempts: max_attempts,
        })
    }

    /// Fetch the log of a finished clone. Failures only lose the log.
    async fn fetch_log(&self, resource: &ResourceRef) -> ExecutionLog {
        match self.service.fetch_log(resource).await {
            Ok(log) => log,
            Err(e) => {
                warn!(uuid = %resource.uuid, error = %e, "Could not get logs");
                ExecutionLog::default()
            }
        }
    }

    /// Clone all repositories in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the first transport error or failed clone.
    pub async fn clone_all(&self, requests: &[CloneRequest]) -> Result<(), CloneError> {
        info!("Start cloning {} repositories", requests.len());

        for request in requests {
            info!("{SEPARATOR}");
            info!("Start cloning {}", request.describe());
            info!("{SEPARATOR}");

            match self.clone_repository(request).await? {
                CloneOutcome::Success => {}
                CloneOutcome::Failure { message } => return Err(CloneError::Failed(message)),
            }
        }

        info!("{SEPARATOR}");
        info!("All repositories were cloned successfully");
        Ok(())
    }

    /// Resolve the configured repositories and clone them.
    ///
    /// # Errors
    /// Returns error if the repositories cannot be resolved or a clone fails.
    pub async fn run(&self, selection: &RepositorySelection) -> Result<(), CloneError> {
        let requests = resolve_repositories(selection).await?;
        self.clone_all(&requests).await
    }
}

/// Emit every log entry at a level matching its severity.
fn report_log(log: &ExecutionLog) {
    if log.is_empty() {
        info!("No logs available");
        return;
    }

    for entry in &log.entries {
        let timestamp = entry
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();
        match entry.severity {
            Severity::Error => error!(index = entry.index, %timestamp, "{}", entry.description),
            Severity::Warning => warn!(index = entry.index, %timestamp, "{}", entry.description),
            Severity::Info | Severity::Success => {
                info!(index = entry.index, %timestamp, "{}", entry.description);
            }
        }
    }
}
