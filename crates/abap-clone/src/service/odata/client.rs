//! `MANAGE_GIT_REPOSITORY` OData client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::{debug, info, warn};

use super::models::{
    CloneBody, CloneEntity, ExecutionLogRow, LogOverviewRow, ODataErrorResponse, ODataResponse,
    PullEntity, ServiceDocument, parse_odata_date,
};
use crate::service::traits::{
    CloneRequest, ExecutionLog, GitRepositoryService, LogEntry, PollStatus, ResourceRef,
    ServiceError, Severity,
};

/// Path of the OData service on the ABAP system.
pub const SERVICE_PATH: &str = "/sap/opu/odata/sap/MANAGE_GIT_REPOSITORY";

/// Default timeout for API requests. Triggering a clone can take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Header used for the CSRF handshake.
const CSRF_HEADER: &str = "x-csrf-token";

/// Entity set that indicates the service exposes the structured log overview.
const LOG_OVERVIEW_ENTITY_SET: &str = "LogOverviews";

/// Client for the `MANAGE_GIT_REPOSITORY` service of an ABAP environment.
#[derive(Clone)]
pub struct ManageGitRepository {
    /// HTTP client with a cookie store, so the CSRF token stays bound to the session.
    client: Client,
    /// Service root, e.g. `https://host/sap/opu/odata/sap/MANAGE_GIT_REPOSITORY`.
    service_url: String,
    username: String,
    password: String,
}

impl ManageGitRepository {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `host` - Base URL of the ABAP system (`https://<system>.abap.<region>.hana.ondemand.com`)
    /// * `username` - Communication user
    /// * `password` - Communication user password
    ///
    /// # Errors
    /// Returns error if the host is not a valid URL or the HTTP client cannot be created.
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let parsed = url::Url::parse(host.trim())
            .map_err(|e| ServiceError::Config(format!("Invalid host '{host}': {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            service_url: format!("{}{SERVICE_PATH}", parsed.as_str().trim_end_matches('/')),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Service root URL.
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
    }

    /// Log on to the system and obtain a CSRF token for the following POST.
    async fn fetch_csrf_token(&self, url: &str) -> Result<Option<String>, ServiceError> {
        debug!(url = %url, "HEAD request (CSRF token fetch)");

        let response = self
            .request(Method::HEAD, url)
            .header(CSRF_HEADER, "fetch")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: format!("Authentication on the ABAP system failed ({status})"),
            });
        }

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if token.is_none() {
            warn!(url = %url, "ABAP system did not return a CSRF token");
        }
        debug!(url = %url, "Authentication on the ABAP system successful");
        Ok(token)
    }

    /// Make an authenticated GET request and unwrap the OData `d` payload.
    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        debug!(url = %url, "GET request");
        let response = self.request(Method::GET, url).send().await?;
        Self::handle_response(response).await
    }

    /// Handle API response, parsing the OData payload or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            // A logon page or other non-OData body carries no entity either.
            let body: ODataResponse<T> = serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                ServiceError::EmptyResponse
            })?;
            body.d.ok_or(ServiceError::EmptyResponse)
        } else {
            Err(ServiceError::Api {
                status: status.as_u16(),
                message: Self::error_message(status, &text),
            })
        }
    }

    /// Prefer the OData error text over the raw body.
    fn error_message(status: StatusCode, text: &str) -> String {
        serde_json::from_str::<ODataErrorResponse>(text)
            .ok()
            .and_then(|body| {
                let value = body.error.message.and_then(|m| m.value)?;
                Some(match body.error.code {
                    Some(code) => format!("{code} - {value}"),
                    None => value,
                })
            })
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text.to_string()
                }
            })
    }

    /// Whether the service exposes the structured log overview.
    async fn supports_log_overview(&self) -> bool {
        let url = format!("{}/?$format=json", self.service_url);
        match self.get::<ServiceDocument>(&url).await {
            Ok(document) => document
                .entity_sets
                .iter()
                .any(|set| set == LOG_OVERVIEW_ENTITY_SET),
            Err(e) => {
                debug!(error = %e, "Could not read service document");
                false
            }
        }
    }

    /// Convert the log overview of a pull entity to log entries.
    ///
    /// Each overview row is followed by its protocol rows.
    fn overview_entries(mut rows: Vec<LogOverviewRow>) -> Vec<LogEntry> {
        rows.sort_by_key(|row| row.log_index);

        let mut entries = Vec::new();
        for mut row in rows {
            entries.push(LogEntry {
                index: row.log_index,
                severity: Severity::from_type(&row.type_of_found_issues),
                description: format!("{}: {}", row.log_name, row.type_of_found_issues),
                timestamp: row.timestamp.as_deref().and_then(parse_odata_date),
            });

            row.to_log_protocol.results.sort_by_key(|p| p.index_no);
            entries.extend(row.to_log_protocol.results.iter().map(|p| LogEntry {
                index: p.index_no,
                severity: Severity::from_type(&p.entry_type),
                description: p.descr.clone(),
                timestamp: p.timestamp.as_deref().and_then(parse_odata_date),
            }));
        }
        entries
    }

    fn execution_entries(rows: &[ExecutionLogRow]) -> Vec<LogEntry> {
        rows.iter().map(LogEntry::from).collect()
    }
}

#[async_trait]
impl GitRepositoryService for ManageGitRepository {
    async fn submit(&self, request: &CloneRequest) -> Result<ResourceRef, ServiceError> {
        if request.repository_name.trim().is_empty() {
            return Err(ServiceError::Config(
                "An empty string was passed for the parameter 'repositoryName'".to_string(),
            ));
        }
        if request.commit_id.is_some() && request.tag.is_some() {
            info!(
                commit = ?request.commit_id,
                tag = ?request.tag,
                "The commit ID takes precedence over the tag"
            );
        }

        let clones_url = format!("{}/Clones", self.service_url);
        let token = self.fetch_csrf_token(&clones_url).await?;

        let body = CloneBody {
            sc_name: request.repository_name.clone(),
            branch_name: request.branch_name.clone(),
            commit_id: request.commit_id.clone(),
            tag_name: if request.commit_id.is_none() {
                request.tag.clone()
            } else {
                None
            },
        };

        debug!(url = %clones_url, "POST request");
        let mut builder = self
            .request(Method::POST, &clones_url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(token) = &token {
            builder = builder.header(CSRF_HEADER, token);
        }
        let response = builder.send().await?;
        let status = response.status();

        let entity: CloneEntity = Self::handle_response(response).await?;
        info!(
            status_code = status.as_u16(),
            repository = %request.repository_name,
            branch = %request.branch_name,
            commit = ?request.commit_id,
            "Triggered clone of repository / software component"
        );

        let uuid = match entity.uuid.as_deref().map(str::trim) {
            Some(uuid) if !entity.is_empty() && !uuid.is_empty() => uuid.to_string(),
            _ => {
                warn!(
                    repository = %request.repository_name,
                    branch = %request.branch_name,
                    "Could not clone the repository / software component"
                );
                return Err(ServiceError::EmptyResponse);
            }
        };

        // `Clones` cannot be polled; progress is tracked on the related `Pull` entity.
        Ok(ResourceRef {
            url: format!("{}/Pull(uuid=guid'{uuid}')", self.service_url),
            uuid,
        })
    }

    async fn poll(&self, resource: &ResourceRef) -> Result<PollStatus, ServiceError> {
        let entity: PullEntity = self.get(&resource.url).await?;
        if entity.is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        let status = PollStatus::from_code(entity.status.as_deref().unwrap_or_default());
        info!(
            uuid = %resource.uuid,
            status = %status,
            description = entity.status_descr.as_deref().unwrap_or_default(),
            "Clone status"
        );
        Ok(status)
    }

    async fn fetch_log(&self, resource: &ResourceRef) -> Result<ExecutionLog, ServiceError> {
        let mut overview = Vec::new();
        if self.supports_log_overview().await {
            let url = format!(
                "{}?$expand=to_Log_Overview,to_Log_Overview/to_Log_Protocol",
                resource.url
            );
            let entity: PullEntity = self.get(&url).await?;
            overview = entity
                .to_log_overview
                .map(|results| Self::overview_entries(results.results))
                .unwrap_or_default();
        }

        let url = format!("{}?$expand=to_Execution_log", resource.url);
        let entity: PullEntity = self.get(&url).await?;
        let execution = entity
            .to_execution_log
            .map(|results| Self::execution_entries(&results.results))
            .unwrap_or_default();

        let mut log = ExecutionLog::new(execution);
        log.extend(ExecutionLog {
            entries: overview,
        });

        debug!(uuid = %resource.uuid, entries = log.entries.len(), "Fetched clone log");
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_url_from_host() {
        let client = ManageGitRepository::new("https://example.com/", "user", "password").unwrap();
        assert_eq!(
            client.service_url(),
            "https://example.com/sap/opu/odata/sap/MANAGE_GIT_REPOSITORY"
        );
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let err = ManageGitRepository::new("not a url", "user", "password")
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_error_message_prefers_odata_text() {
        let body = r#"{"error":{"code":"GIT/001","message":{"lang":"en","value":"Branch does not exist"}}}"#;
        assert_eq!(
            ManageGitRepository::error_message(StatusCode::BAD_REQUEST, body),
            "GIT/001 - Branch does not exist"
        );
        assert_eq!(
            ManageGitRepository::error_message(StatusCode::BAD_GATEWAY, ""),
            "502 Bad Gateway"
        );
    }
}
