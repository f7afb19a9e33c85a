//! Postgres deploy store
//!
//! Thin adapter over the repository functions. Composite writes open a
//! transaction and commit only after every statement succeeded; dropping the
//! transaction on an early return rolls it back.

use async_trait::async_trait;
use convoy_core::domain::{
    Deploy, DeployProject, DeployStatus, Group, JobRecord, PipelineRecord, RegistryProject,
};
use sqlx::PgPool;
use std::collections::HashMap;

use super::{DeployStore, GroupChangePlan, GroupWrite, NewDeployRecord, StoreError, StoreResult};
use crate::repository::{
    deploy_repository, group_repository, job_repository, pipeline_repository,
    project_repository, registry_repository,
};

/// Deploy store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgDeployStore {
    pool: PgPool,
}

impl PgDeployStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn unique violations into conflicts, leaving other errors untouched
fn conflict_on_unique(err: StoreError, what: impl FnOnce() -> String) -> StoreError {
    match err {
        StoreError::Database(ref db)
            if db
                .as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false) =>
        {
            StoreError::Conflict(what())
        }
        other => other,
    }
}

#[async_trait]
impl DeployStore for PgDeployStore {
    async fn insert_full_deploy(&self, new: NewDeployRecord) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let deploy_id = deploy_repository::insert(&mut *tx, &new.description, &new.body).await?;

        for group in &new.groups {
            group_repository::insert(&mut *tx, deploy_id, group)
                .await
                .map_err(|e| {
                    conflict_on_unique(e, || format!("group index {} repeated", group.group_index))
                })?;
        }

        for project in &new.projects {
            project_repository::insert(&mut *tx, deploy_id, project).await?;
        }

        tx.commit().await?;
        tracing::debug!(
            deploy_id,
            groups = new.groups.len(),
            projects = new.projects.len(),
            "Inserted deploy"
        );
        Ok(deploy_id)
    }

    async fn get_deploy(&self, id: i64) -> StoreResult<Option<Deploy>> {
        deploy_repository::find_by_id(&self.pool, id).await
    }

    async fn list_deploys(&self, offset: i64, limit: i64) -> StoreResult<Vec<Deploy>> {
        deploy_repository::list_page(&self.pool, offset, limit).await
    }

    async fn set_deploy_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool> {
        deploy_repository::update_status(&self.pool, id, status).await
    }

    async fn update_deploy_description(&self, id: i64, description: &str) -> StoreResult<bool> {
        deploy_repository::update_description(&self.pool, id, description).await
    }

    async fn cancel_deploy(&self, id: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if !deploy_repository::update_status(&mut *tx, id, DeployStatus::Canceled).await? {
            return Ok(false);
        }
        project_repository::update_status_by_deploy(&mut *tx, id, DeployStatus::Canceled).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_groups(&self, deploy_id: i64) -> StoreResult<Vec<Group>> {
        group_repository::find_by_deploy(&self.pool, deploy_id).await
    }

    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>> {
        group_repository::find_by_id(&self.pool, id).await
    }

    async fn find_group(&self, deploy_id: i64, group_index: i32) -> StoreResult<Option<Group>> {
        group_repository::find_by_index(&self.pool, deploy_id, group_index).await
    }

    async fn apply_group_change(&self, plan: GroupChangePlan) -> StoreResult<i64> {
        let deploy_id = plan.deploy_id;
        let mut tx = self.pool.begin().await?;

        if deploy_repository::find_by_id(&mut *tx, deploy_id).await?.is_none() {
            return Err(StoreError::NotFound(format!("deploy {}", deploy_id)));
        }

        let taken = |index: i32| {
            move || format!("group index {} already exists for deploy {}", index, deploy_id)
        };

        let group_id = match &plan.group {
            GroupWrite::Create(group) => group_repository::insert(&mut *tx, deploy_id, group)
                .await
                .map_err(|e| conflict_on_unique(e, taken(group.group_index)))?,
            GroupWrite::Update { id, group } => {
                match group_repository::find_by_id(&mut *tx, *id).await? {
                    Some(existing) if existing.deploy_id == deploy_id => {}
                    _ => return Err(StoreError::NotFound(format!("group {}", id))),
                }
                group_repository::update(&mut *tx, *id, group)
                    .await
                    .map_err(|e| conflict_on_unique(e, taken(group.group_index)))?;
                *id
            }
        };

        for project in &plan.insert {
            project_repository::insert(&mut *tx, deploy_id, project).await?;
        }
        for update in &plan.update {
            if !project_repository::update_target(&mut *tx, update).await? {
                return Err(StoreError::NotFound(format!("project row {}", update.id)));
            }
        }
        if !plan.delete.is_empty() {
            project_repository::delete_many(&mut *tx, &plan.delete).await?;
        }
        deploy_repository::touch(&mut *tx, deploy_id).await?;

        tx.commit().await?;
        Ok(group_id)
    }

    async fn list_projects(&self, deploy_id: i64) -> StoreResult<Vec<DeployProject>> {
        project_repository::find_by_deploy(&self.pool, deploy_id).await
    }

    async fn list_group_projects(
        &self,
        deploy_id: i64,
        group_index: i32,
    ) -> StoreResult<Vec<DeployProject>> {
        project_repository::find_by_group(&self.pool, deploy_id, group_index).await
    }

    async fn record_project_release(
        &self,
        id: i64,
        actual_tag: &str,
        pipeline_id: i64,
    ) -> StoreResult<bool> {
        project_repository::update_release(&self.pool, id, actual_tag, pipeline_id).await
    }

    async fn set_project_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool> {
        project_repository::update_status(&self.pool, id, status).await
    }

    async fn upsert_pipeline(&self, pipeline: &PipelineRecord) -> StoreResult<()> {
        pipeline_repository::upsert(&self.pool, pipeline).await
    }

    async fn list_pipelines(&self, deploy_id: i64) -> StoreResult<Vec<PipelineRecord>> {
        pipeline_repository::find_by_deploy(&self.pool, deploy_id).await
    }

    async fn upsert_job(&self, job: &JobRecord) -> StoreResult<()> {
        job_repository::upsert(&self.pool, job).await
    }

    async fn list_jobs(&self, deploy_id: i64) -> StoreResult<Vec<JobRecord>> {
        job_repository::find_by_deploy(&self.pool, deploy_id).await
    }

    async fn list_stage_jobs(
        &self,
        deploy_id: i64,
        pipeline_id: i64,
        stage_like: &str,
    ) -> StoreResult<Vec<JobRecord>> {
        job_repository::find_by_stage(&self.pool, deploy_id, pipeline_id, stage_like).await
    }

    async fn project_names(&self, ids: &[i64]) -> StoreResult<HashMap<i64, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = registry_repository::find_names(&self.pool, ids).await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_registry_projects(&self, group_id: i64) -> StoreResult<Vec<RegistryProject>> {
        registry_repository::find_by_group(&self.pool, group_id).await
    }

    async fn insert_registry_project(&self, project: &RegistryProject) -> StoreResult<()> {
        registry_repository::insert(&self.pool, project)
            .await
            .map_err(|e| {
                conflict_on_unique(e, || format!("project {} already registered", project.id))
            })
    }

    async fn delete_registry_project(&self, id: i64) -> StoreResult<bool> {
        registry_repository::delete(&self.pool, id).await
    }

    async fn update_registry_alias(&self, id: i64, alias: &str) -> StoreResult<bool> {
        registry_repository::update_alias(&self.pool, id, alias).await
    }
}
