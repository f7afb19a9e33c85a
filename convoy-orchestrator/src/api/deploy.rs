//! Deploy API Handlers
//!
//! HTTP endpoints for deploy submission, execution and inspection.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use convoy_core::domain::Deploy;
use convoy_core::dto::deploy::{
    CancelDeployRequest, CopyDeployRequest, DeployDetail, GroupDeployChange, NewFullDeploy,
    RetryFetchResult, RunDeployRequest,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use crate::api::error::ApiResult;
use crate::engine::EngineError;
use crate::service::query_service;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    query_service::DEFAULT_PAGE_SIZE
}

/// GET /deploys
/// List deploys, newest first
pub async fn list_deploys(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Deploy>>> {
    tracing::debug!("Listing deploys from {}", query.offset);

    let store = state.orchestrator.store();
    let deploys = query_service::list_deploys(store.as_ref(), query.offset, query.limit).await?;
    Ok(Json(deploys))
}

/// GET /deploy/{id}
/// Deploy with groups, projects, pipelines and jobs
pub async fn get_deploy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeployDetail>> {
    tracing::debug!("Getting deploy: {}", id);

    let store = state.orchestrator.store();
    let detail = query_service::deploy_detail(store.as_ref(), id).await?;
    Ok(Json(detail))
}

/// POST /deploy/create
/// Submit a deploy with all its groups and projects
pub async fn create_deploy(
    State(state): State<AppState>,
    Json(req): Json<NewFullDeploy>,
) -> ApiResult<Json<Value>> {
    tracing::info!(
        "Creating deploy with {} groups and {} projects",
        req.groups.len(),
        req.projects.len()
    );

    let id = state.orchestrator.add_full_deploy(req).await?;
    Ok(Json(json!({ "id": id })))
}

/// POST /deploy/run
/// Start a deploy in the background
pub async fn run_deploy(
    State(state): State<AppState>,
    Json(req): Json<RunDeployRequest>,
) -> ApiResult<Json<Value>> {
    let id = req.id;
    state
        .orchestrator
        .store()
        .get_deploy(id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::NotFound(format!("deploy {}", id)))?;

    tracing::info!("Running deploy {} against {}", id, req.target.host);

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.run_deploy(id, &req.target).await {
            Ok(status) => tracing::info!(deploy_id = id, %status, "Deploy run finished"),
            Err(err) => tracing::error!(deploy_id = id, "Deploy run aborted: {}", err),
        }
    });

    Ok(Json(json!({ "ok": true, "id": id })))
}

/// POST /deploy/retry
/// Poll the deploy's pipelines once and apply the outcome
pub async fn retry_fetch(
    State(state): State<AppState>,
    Json(req): Json<RunDeployRequest>,
) -> ApiResult<Json<RetryFetchResult>> {
    tracing::info!("Retry fetch for deploy {}", req.id);

    let outcome = state.orchestrator.retry_fetch(req.id, &req.target).await?;
    Ok(Json(RetryFetchResult {
        ok: true,
        id: req.id,
        outcome,
    }))
}

/// POST /deploy/copy
/// Copy a deploy into a new pending one
pub async fn copy_deploy(
    State(state): State<AppState>,
    Json(req): Json<CopyDeployRequest>,
) -> ApiResult<Json<Value>> {
    tracing::info!("Copying deploy {}", req.from_id);

    let id = state
        .orchestrator
        .copy_deploy_from_old(req.from_id, req.description)
        .await?;
    Ok(Json(json!({ "id": id })))
}

/// POST /deploy/cancel
pub async fn cancel_deploy(
    State(state): State<AppState>,
    Json(req): Json<CancelDeployRequest>,
) -> ApiResult<Json<Value>> {
    tracing::info!("Canceling deploy {}", req.id);

    state.orchestrator.cancel_deploy(req.id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// POST /deploy/group
/// Upsert a group and reconcile its projects
pub async fn change_group(
    State(state): State<AppState>,
    Json(req): Json<GroupDeployChange>,
) -> ApiResult<Json<Value>> {
    tracing::info!("Changing group {} of deploy {}", req.group_index, req.deploy_id);

    let group_id = state.orchestrator.change_deploy_group_info(req).await?;
    Ok(Json(json!({ "ok": true, "group_id": group_id })))
}
