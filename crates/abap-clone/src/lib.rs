//! Clone Git repositories into ABAP environment systems.
//!
//! This crate implements the clone step of an ABAP environment pipeline:
//! it triggers the import of a Git-hosted software component through the
//! `MANAGE_GIT_REPOSITORY` OData service, polls the import until it
//! finishes, and turns the status and the execution log into a verdict.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   CloneRequest   ┌─────────────────────┐   OData V2   ┌─────────────┐
//! │  manifest /  │ ───────────────► │  CloneOrchestrator  │ ───────────► │ ABAP system │
//! │  config      │                  │  submit → poll →    │ ◄─────────── │             │
//! └──────────────┘                  │  fetch log → verdict│              └─────────────┘
//!                                   └─────────────────────┘
//! ```
//!
//! Repositories are processed strictly one after another; the run stops at
//! the first failure.
//!
//! ## Example
//!
//! ```ignore
//! use abap_clone::{CloneOrchestrator, CloneRequest, ManageGitRepository, PollSettings};
//!
//! let service = ManageGitRepository::new("https://my-system.abap.eu10.hana.ondemand.com", user, password)?;
//! let orchestrator = CloneOrchestrator::new(service, PollSettings::default());
//!
//! let outcome = orchestrator
//!     .clone_repository(&CloneRequest::new("/DMO/REPO_A", "main"))
//!     .await?;
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod manifest;
pub mod orchestrator;
pub mod service;

pub use config::{CloneConfig, ConfigError, PollSettings};
pub use manifest::{Manifest, ManifestError, RepositoryDescriptor, RepositorySelection};
pub use orchestrator::{CloneError, CloneOrchestrator, CloneOutcome};
pub use service::odata::ManageGitRepository;
pub use service::{
    CloneRequest, ExecutionLog, GitRepositoryService, LogEntry, PollStatus, ResourceRef,
    ServiceError, Severity,
};
