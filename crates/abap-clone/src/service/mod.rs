//! ABAP system service implementations.
//!
//! This module contains the [`GitRepositoryService`] trait the orchestrator
//! drives and its OData implementation.

pub mod odata;
pub mod traits;

pub use traits::{
    CloneRequest, ExecutionLog, GitRepositoryService, LogEntry, PollStatus, ResourceRef,
    ServiceError, Severity,
};

#[cfg(test)]
pub use traits::MockGitRepositoryService;
