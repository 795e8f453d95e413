//! Repository manifests and repository selection.
//!
//! A manifest lists the software components to clone, in order:
//!
//! ```yaml
//! repositories:
//!   - name: /DMO/REPO_A
//!     branch: branchA
//!     tag: v-1.0.1-build-0001
//!     version: 1.0.1
//!     commitID: ABCD1234
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::service::CloneRequest;

/// Errors raised while working out which repositories to clone.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Neither a manifest nor a repository/branch pair was configured.
    #[error(
        "Failed to read repository configuration: You have not specified any repository configuration. Please make sure that you have correctly specified it."
    )]
    NotConfigured,

    /// The configured manifest does not exist.
    #[error("Could not find {0}")]
    NotFound(String),

    /// The manifest exists but could not be read.
    #[error("Could not read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML for the expected shape.
    #[error("Could not parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The manifest does not name a single repository.
    #[error("Error in config file {0}, AddonDescriptor doesn't contain any repositories")]
    NoRepositories(String),

    /// An entry lacks the name or branch a clone needs.
    #[error("Error in config file {file}, repository {position} needs a name and a branch")]
    IncompleteEntry { file: String, position: usize },
}

/// One entry of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Software component name.
    #[serde(default)]
    pub name: String,
    /// Branch to clone.
    #[serde(default)]
    pub branch: String,
    /// Tag to check out when no commit is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Software component version. Informational for cloning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Commit to check out.
    #[serde(rename = "commitID", default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
}

impl RepositoryDescriptor {
    /// Build the clone request for this entry.
    pub fn to_clone_request(&self) -> CloneRequest {
        let mut request = CloneRequest::new(self.name.trim(), self.branch.trim());
        if let Some(commit) = &self.commit_id {
            request = request.with_commit(commit.as_str());
        }
        if let Some(tag) = &self.tag {
            request = request.with_tag(tag.as_str());
        }
        request
    }
}

/// Parsed manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub repositories: Vec<RepositoryDescriptor>,
}

impl Manifest {
    /// Parse a manifest from YAML text. `file` is only used in error messages.
    ///
    /// # Errors
    /// Returns error if the YAML is invalid or names no repository.
    pub fn from_yaml(contents: &str, file: &str) -> Result<Self, ManifestError> {
        // An empty document is valid YAML but not a manifest.
        let manifest: Option<Self> =
            serde_yaml::from_str(contents).map_err(|source| ManifestError::Parse {
                file: file.to_string(),
                source,
            })?;
        let manifest = manifest.unwrap_or_default();

        if manifest
            .repositories
            .iter()
            .all(|repo| repo.name.trim().is_empty())
        {
            return Err(ManifestError::NoRepositories(file.to_string()));
        }
        if let Some(index) = manifest
            .repositories
            .iter()
            .position(|repo| repo.name.trim().is_empty() || repo.branch.trim().is_empty())
        {
            return Err(ManifestError::IncompleteEntry {
                file: file.to_string(),
                position: index + 1,
            });
        }
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    /// Returns [`ManifestError::NotFound`] if the file does not exist.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let file = path.display().to_string();
        let contents = fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound(file.clone())
            } else {
                ManifestError::Read {
                    file: file.clone(),
                    source,
                }
            }
        })?;

        Self::from_yaml(&contents, &file)
    }
}

/// Which repositories a run should clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySelection {
    /// Single repository to clone.
    pub repository_name: Option<String>,
    /// Branch of the single repository.
    pub branch_name: Option<String>,
    /// Commit of the single repository.
    pub commit_id: Option<String>,
    /// Manifest listing repositories to clone.
    pub repositories: Option<PathBuf>,
}

fn configured(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Resolve the ordered list of clone requests for a run.
///
/// Manifest entries come first, in file order, followed by the directly
/// configured repository when both its name and branch are set.
///
/// # Errors
/// Returns error if nothing is configured or the manifest cannot be used.
pub async fn resolve_repositories(
    selection: &RepositorySelection,
) -> Result<Vec<CloneRequest>, ManifestError> {
    let name = configured(selection.repository_name.as_ref());
    let branch = configured(selection.branch_name.as_ref());
    let manifest_path = selection
        .repositories
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty());

    if name.is_none() && branch.is_none() && manifest_path.is_none() {
        return Err(ManifestError::NotConfigured);
    }

    let mut requests = Vec::new();

    if let Some(path) = manifest_path {
        let manifest = Manifest::load(path).await?;
        debug!(
            file = %path.display(),
            repositories = manifest.repositories.len(),
            "Read repository manifest"
        );
        requests.extend(
            manifest
                .repositories
                .iter()
                .map(RepositoryDescriptor::to_clone_request),
        );
    }

    if let (Some(name), Some(branch)) = (name, branch) {
        let mut request = CloneRequest::new(name, branch);
        if let Some(commit) = configured(selection.commit_id.as_ref()) {
            request = request.with_commit(commit);
        }
        requests.push(request);
    }

    // A repository name without a branch cannot be cloned on its own.
    if requests.is_empty() {
        return Err(ManifestError::NotConfigured);
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_REPOSITORIES: &str = "---
repositories:
- name: /DMO/REPO_A
  tag: v-1.0.1-build-0001
  branch: branchA
  version: 1.0.1
- name: /DMO/REPO_B
  tag: rel-2.1.1-build-0001
  branch: branchB
  version: 2.1.1
  commitID: ABCD1234
";

    fn write_manifest(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("repositories.yml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_manifest_from_yaml() {
        let manifest = Manifest::from_yaml(TWO_REPOSITORIES, "repositories.yml").unwrap();
        assert_eq!(manifest.repositories.len(), 2);
        assert_eq!(manifest.repositories[0].name, "/DMO/REPO_A");
        assert_eq!(manifest.repositories[1].commit_id.as_deref(), Some("ABCD1234"));

        let request = manifest.repositories[1].to_clone_request();
        assert_eq!(request.branch_name, "branchB");
        assert_eq!(request.commit_id.as_deref(), Some("ABCD1234"));
        assert_eq!(request.tag.as_deref(), Some("rel-2.1.1-build-0001"));
    }

    #[test]
    fn test_manifest_without_repositories() {
        for contents in ["", "repositories: []\n", "repositories:\n- branch: main\n"] {
            let err = Manifest::from_yaml(contents, "filename.yaml").unwrap_err();
            assert_eq!(
                err.to_string(),
                "Error in config file filename.yaml, AddonDescriptor doesn't contain any repositories"
            );
        }
    }

    #[test]
    fn test_manifest_entry_without_name_or_branch() {
        let without_name = "repositories:\n- name: /DMO/REPO_A\n  branch: main\n- branch: main\n";
        let err = Manifest::from_yaml(without_name, "filename.yaml").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error in config file filename.yaml, repository 2 needs a name and a branch"
        );

        let without_branch = "repositories:\n- name: /DMO/REPO_A\n";
        let err = Manifest::from_yaml(without_branch, "filename.yaml").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::IncompleteEntry { position: 1, .. }
        ));
    }

    #[test]
    fn test_manifest_invalid_yaml() {
        let err = Manifest::from_yaml("repositories: [", "filename.yaml").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_missing_manifest() {
        let selection = RepositorySelection {
            repository_name: Some("testRepo1".to_string()),
            branch_name: Some("testBranch1".to_string()),
            repositories: Some(PathBuf::from("filename.yaml")),
            ..Default::default()
        };
        let err = resolve_repositories(&selection).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not find filename.yaml");
    }

    #[tokio::test]
    async fn test_resolve_manifest_then_single_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(&dir, TWO_REPOSITORIES);

        let selection = RepositorySelection {
            repository_name: Some("testRepo1".to_string()),
            branch_name: Some("testBranch1".to_string()),
            commit_id: Some("1234ABCD".to_string()),
            repositories: Some(path),
        };
        let requests = resolve_repositories(&selection).await.unwrap();
        let names: Vec<&str> = requests
            .iter()
            .map(|r| r.repository_name.as_str())
            .collect();
        assert_eq!(names, vec!["/DMO/REPO_A", "/DMO/REPO_B", "testRepo1"]);
        assert_eq!(requests[2].commit_id.as_deref(), Some("1234ABCD"));
    }

    #[tokio::test]
    async fn test_resolve_single_repository_needs_branch() {
        let selection = RepositorySelection {
            repository_name: Some("testRepo1".to_string()),
            ..Default::default()
        };
        let err = resolve_repositories(&selection).await.unwrap_err();
        assert!(matches!(err, ManifestError::NotConfigured));
    }

    #[tokio::test]
    async fn test_resolve_nothing_configured() {
        let selection = RepositorySelection {
            repository_name: Some("  ".to_string()),
            repositories: Some(PathBuf::new()),
            ..Default::default()
        };
        let err = resolve_repositories(&selection).await.unwrap_err();
        assert!(matches!(err, ManifestError::NotConfigured));
    }
}
