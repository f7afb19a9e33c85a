//! Project API Handlers
//!
//! Registry endpoints and branch search.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use convoy_core::domain::RegistryProject;
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use crate::api::error::ApiResult;
use crate::service::project_service;

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    #[serde(default = "default_group_id")]
    pub group_id: i64,
}

fn default_group_id() -> i64 {
    project_service::DEFAULT_GROUP_ID
}

#[derive(Debug, Deserialize)]
pub struct AliasRequest {
    pub alias: String,
}

#[derive(Debug, Deserialize)]
pub struct BranchQuery {
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub project_ids: Vec<i64>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// GET /projects
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<RegistryProject>>> {
    tracing::debug!("Listing projects of group {}", query.group_id);

    let store = state.orchestrator.store();
    let projects = project_service::list_projects(store.as_ref(), query.group_id).await?;
    Ok(Json(projects))
}

/// POST /projects
pub async fn register_project(
    State(state): State<AppState>,
    Json(req): Json<RegistryProject>,
) -> ApiResult<(StatusCode, Json<RegistryProject>)> {
    let store = state.orchestrator.store();
    let project = project_service::register_project(store.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// POST /project/{id}
/// Update the alias of a registered project
pub async fn update_alias(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AliasRequest>,
) -> ApiResult<Json<Value>> {
    let store = state.orchestrator.store();
    project_service::update_alias(store.as_ref(), id, &req.alias).await?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /project/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let store = state.orchestrator.store();
    project_service::delete_project(store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /projects/{id}/branches
pub async fn list_branches(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<BranchQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let client = state.orchestrator.connect(&state.remote)?;
    let branches =
        project_service::list_branches(client.as_ref(), id, query.branch.as_deref()).await?;
    Ok(Json(branches))
}

/// POST /projects/search
/// Which of the given projects have the branch
pub async fn search_projects(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<Vec<i64>>> {
    let Some(branch) = req.branch.filter(|b| !b.trim().is_empty()) else {
        return Ok(Json(req.project_ids));
    };

    let client = state.orchestrator.connect(&state.remote)?;
    let found =
        project_service::projects_with_branch(client.as_ref(), &req.project_ids, &branch).await?;
    Ok(Json(found))
}
