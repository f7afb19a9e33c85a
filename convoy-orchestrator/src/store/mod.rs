//! Deploy Store
//!
//! The store exclusively owns persisted rows. The engine reloads everything it
//! needs on each step, so any backend implementing [`DeployStore`] can serve a
//! restarted orchestrator.
//!
//! Composite writes (`insert_full_deploy`, `apply_group_change`,
//! `cancel_deploy`) are atomic: either every row lands or none does.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDeployStore;
pub use postgres::PgDeployStore;

use async_trait::async_trait;
use convoy_core::domain::{
    Deploy, DependType, DeployProject, DeployStatus, Group, JobRecord, PipelineRecord,
    RegistryProject,
};
use std::collections::HashMap;
use thiserror::Error;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A persisted value could not be mapped back to a domain type
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A deploy with all its groups and projects, written in one transaction
#[derive(Debug, Clone)]
pub struct NewDeployRecord {
    pub description: String,
    pub body: String,
    pub groups: Vec<NewGroupRecord>,
    pub projects: Vec<NewProjectRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroupRecord {
    pub group_index: i32,
    pub depend_group_index: Option<i32>,
    pub depend_type: Option<DependType>,
}

/// A pending project row; runtime fields start empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectRecord {
    pub group_index: i32,
    pub project_id: i64,
    pub project_name: String,
    pub branch: String,
    pub tag_prefix: String,
}

/// How the group row itself is written in a group change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupWrite {
    Create(NewGroupRecord),
    Update { id: i64, group: NewGroupRecord },
}

/// In-place update of a project kept by a group change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub id: i64,
    pub group_index: i32,
    pub branch: String,
    pub tag_prefix: String,
}

/// Everything a group change writes, applied in one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChangePlan {
    pub deploy_id: i64,
    pub group: GroupWrite,
    pub insert: Vec<NewProjectRecord>,
    pub update: Vec<ProjectUpdate>,
    pub delete: Vec<i64>,
}

/// Persistence capability consumed by the engine and the query services
#[async_trait]
pub trait DeployStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Deploys
    // -------------------------------------------------------------------------

    /// Insert a pending deploy with its groups and projects; returns its id
    async fn insert_full_deploy(&self, deploy: NewDeployRecord) -> StoreResult<i64>;

    async fn get_deploy(&self, id: i64) -> StoreResult<Option<Deploy>>;

    /// Newest first
    async fn list_deploys(&self, offset: i64, limit: i64) -> StoreResult<Vec<Deploy>>;

    async fn set_deploy_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool>;

    async fn update_deploy_description(&self, id: i64, description: &str) -> StoreResult<bool>;

    /// Mark the deploy and all of its projects canceled
    async fn cancel_deploy(&self, id: i64) -> StoreResult<bool>;

    // -------------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------------

    /// Ordered by group_index, then id
    async fn list_groups(&self, deploy_id: i64) -> StoreResult<Vec<Group>>;

    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>>;

    async fn find_group(&self, deploy_id: i64, group_index: i32) -> StoreResult<Option<Group>>;

    /// Write a group and reconcile its projects; returns the group id
    ///
    /// Fails with [`StoreError::Conflict`] when the group index is taken.
    async fn apply_group_change(&self, plan: GroupChangePlan) -> StoreResult<i64>;

    // -------------------------------------------------------------------------
    // Projects
    // -------------------------------------------------------------------------

    /// Ordered by id (insertion order)
    async fn list_projects(&self, deploy_id: i64) -> StoreResult<Vec<DeployProject>>;

    /// Ordered by id (insertion order)
    async fn list_group_projects(
        &self,
        deploy_id: i64,
        group_index: i32,
    ) -> StoreResult<Vec<DeployProject>>;

    /// Store the cut tag and its pipeline and mark the project running
    async fn record_project_release(
        &self,
        id: i64,
        actual_tag: &str,
        pipeline_id: i64,
    ) -> StoreResult<bool>;

    async fn set_project_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool>;

    // -------------------------------------------------------------------------
    // Remote mirrors
    // -------------------------------------------------------------------------

    async fn upsert_pipeline(&self, pipeline: &PipelineRecord) -> StoreResult<()>;

    async fn list_pipelines(&self, deploy_id: i64) -> StoreResult<Vec<PipelineRecord>>;

    async fn upsert_job(&self, job: &JobRecord) -> StoreResult<()>;

    async fn list_jobs(&self, deploy_id: i64) -> StoreResult<Vec<JobRecord>>;

    /// Jobs of one pipeline whose stage name contains `stage_like`
    async fn list_stage_jobs(
        &self,
        deploy_id: i64,
        pipeline_id: i64,
        stage_like: &str,
    ) -> StoreResult<Vec<JobRecord>>;

    // -------------------------------------------------------------------------
    // Project registry
    // -------------------------------------------------------------------------

    /// Registry names for the given remote project ids; unknown ids are absent
    async fn project_names(&self, ids: &[i64]) -> StoreResult<HashMap<i64, String>>;

    async fn list_registry_projects(&self, group_id: i64) -> StoreResult<Vec<RegistryProject>>;

    async fn insert_registry_project(&self, project: &RegistryProject) -> StoreResult<()>;

    async fn delete_registry_project(&self, id: i64) -> StoreResult<bool>;

    async fn update_registry_alias(&self, id: i64, alias: &str) -> StoreResult<bool>;
}
