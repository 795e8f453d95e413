//! Step configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::manifest::RepositorySelection;

/// Default delay between two status polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default number of status polls before giving up (one hour at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 360;

/// Invalid configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No host configured for the ABAP system")]
    MissingHost,

    #[error("Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("No user configured for the ABAP system")]
    MissingUsername,

    #[error("The maximum number of poll attempts must be at least 1")]
    NoPollAttempts,
}

/// How the clone status is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two polls.
    pub interval: Duration,
    /// Maximum number of polls per repository.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Full configuration of a clone run.
#[derive(Debug, Clone, Default)]
pub struct CloneConfig {
    /// Base URL of the ABAP system.
    pub host: String,
    /// Communication user.
    pub username: String,
    /// Communication user password.
    pub password: String,
    /// Single repository to clone.
    pub repository_name: Option<String>,
    /// Branch of the single repository.
    pub branch_name: Option<String>,
    /// Commit of the single repository.
    pub commit_id: Option<String>,
    /// Manifest listing repositories to clone.
    pub repositories: Option<PathBuf>,
    /// Polling behaviour.
    pub poll: PollSettings,
}

impl CloneConfig {
    /// Check the connection and polling settings.
    ///
    /// Repository selection is validated when the repositories are resolved.
    ///
    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let url = url::Url::parse(host).map_err(|e| ConfigError::InvalidHost {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidHost {
                host: host.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::NoPollAttempts);
        }
        Ok(())
    }

    /// The repositories part of the configuration.
    pub fn selection(&self) -> RepositorySelection {
        RepositorySelection {
            repository_name: self.repository_name.clone(),
            branch_name: self.branch_name.clone(),
            commit_id: self.commit_id.clone(),
            repositories: self.repositories.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CloneConfig {
        CloneConfig {
            host: "https://example.com".to_string(),
            username: "user".to_string(),
            password: "password".to_string(),
            repository_name: Some("testRepo1".to_string()),
            branch_name: Some("testBranch1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(config().validate(), Ok(()));
        assert_eq!(config().poll, PollSettings::default());
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = config();
        cfg.host = " ".to_string();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingHost));

        let mut cfg = config();
        cfg.host = "ftp://example.com".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidHost { .. })
        ));

        let mut cfg = config();
        cfg.username = String::new();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingUsername));

        let mut cfg = config();
        cfg.poll.max_attempts = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NoPollAttempts));
    }

    #[test]
    fn test_selection_carries_repository_settings() {
        let mut cfg = config();
        cfg.commit_id = Some("ABCD1234".to_string());
        cfg.repositories = Some(PathBuf::from("repositories.yml"));

        let selection = cfg.selection();
        assert_eq!(selection.repository_name.as_deref(), Some("testRepo1"));
        assert_eq!(selection.commit_id.as_deref(), Some("ABCD1234"));
        assert_eq!(
            selection.repositories,
            Some(PathBuf::from("repositories.yml"))
        );
    }
}
