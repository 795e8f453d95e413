//! ABAP environment `MANAGE_GIT_REPOSITORY` service.
//!
//! Implements the [`GitRepositoryService`](crate::service::GitRepositoryService)
//! trait over OData V2.
//!
//! ## Flow
//!
//! 1. `HEAD  .../Clones` with `X-Csrf-Token: fetch` to log on
//! 2. `POST  .../Clones` to trigger the clone
//! 3. `GET   .../Pull(uuid=guid'...')` until the status leaves `R`
//! 4. `GET   .../Pull(uuid=guid'...')?$expand=...` for the logs
//!
//! ## Example
//!
//! ```ignore
//! use abap_clone::service::odata::ManageGitRepository;
//! use abap_clone::service::{CloneRequest, GitRepositoryService};
//!
//! let service = ManageGitRepository::new("https://my-system.abap.eu10.hana.ondemand.com", user, password)?;
//! let resource = service.submit(&CloneRequest::new("/DMO/REPO_A", "main")).await?;
//! let status = service.poll(&resource).await?;
//! ```

mod client;
mod models;

pub use client::{ManageGitRepository, SERVICE_PATH};
pub use models::*;
