//! Query Service
//!
//! Deploy listing and the full detail view.

use convoy_core::dto::deploy::{DeployDetail, GroupDetail};
use convoy_core::domain::Deploy;

use crate::engine::{EngineError, EngineResult};
use crate::store::DeployStore;

/// Default page size of the deploy list
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// List deploys, newest first
pub async fn list_deploys(
    store: &dyn DeployStore,
    offset: i64,
    limit: i64,
) -> EngineResult<Vec<Deploy>> {
    let deploys = store.list_deploys(offset.max(0), limit.clamp(1, 500)).await?;
    Ok(deploys)
}

/// Deploy with its groups, projects and mirrored pipelines and jobs
pub async fn deploy_detail(store: &dyn DeployStore, id: i64) -> EngineResult<DeployDetail> {
    let deploy = store
        .get_deploy(id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("deploy {}", id)))?;

    let groups = store.list_groups(id).await?;
    let mut projects = store.list_projects(id).await?;
    projects.sort_by_key(|p| (p.group_index, p.id));
    let pipelines = store.list_pipelines(id).await?;
    let jobs = store.list_jobs(id).await?;

    let groups_detailed = groups
        .iter()
        .map(|group| GroupDetail {
            group: group.clone(),
            projects: projects
                .iter()
                .filter(|p| p.group_index == group.group_index)
                .cloned()
                .collect(),
        })
        .collect();

    tracing::debug!(
        deploy_id = id,
        projects = projects.len(),
        jobs = jobs.len(),
        "Loaded deploy detail"
    );

    Ok(DeployDetail {
        deploy,
        groups,
        projects,
        pipelines,
        jobs,
        groups_detailed,
    })
}
