//! Repository Module
//!
//! Postgres data access for the deploy store. Every function takes any
//! `PgExecutor`, so the same query runs against the pool or inside an open
//! transaction.

pub mod deploy;
pub mod group;
pub mod job;
pub mod pipeline;
pub mod project;
pub mod registry;

// Re-export for convenience
pub use deploy as deploy_repository;
pub use group as group_repository;
pub use job as job_repository;
pub use pipeline as pipeline_repository;
pub use project as project_repository;
pub use registry as registry_repository;

use crate::store::StoreError;
use std::str::FromStr;

/// Parse a persisted enum column, reporting the table on failure
pub(crate) fn parse_column<T: FromStr>(table: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>()
        .map_err(|_| StoreError::Corrupt(format!("{}: unexpected value {:?}", table, raw)))
}
