//! Core domain types
//!
//! These types mirror the rows owned by the deploy store. The orchestrator
//! reloads them on every step, so nothing here carries runtime state.

pub mod deploy;
pub mod group;
pub mod job;
pub mod pipeline;
pub mod project;
pub mod registry;
pub mod status;

pub use deploy::Deploy;
pub use group::{DependType, Group};
pub use job::JobRecord;
pub use pipeline::PipelineRecord;
pub use project::DeployProject;
pub use registry::RegistryProject;
pub use status::{DeployStatus, ParseStatusError, RemoteState};
