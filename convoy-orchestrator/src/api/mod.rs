//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod deploy;
pub mod error;
pub mod events;
pub mod health;
pub mod project;

use axum::{
    Router,
    routing::{get, post},
};
use convoy_core::dto::remote::RemoteTarget;
use tower_http::trace::TraceLayer;

use crate::engine::{BroadcastNotifier, Orchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,

    /// Source of the live event streams
    pub events: BroadcastNotifier,

    /// Remote used by the branch search endpoints
    pub remote: RemoteTarget,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        events: BroadcastNotifier,
        remote: RemoteTarget,
    ) -> Self {
        Self {
            orchestrator,
            events,
            remote,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/", get(health::health_check))
        .route("/health", get(health::health_check))
        // Deploy endpoints
        .route("/deploys", get(deploy::list_deploys))
        .route("/deploy/create", post(deploy::create_deploy))
        .route("/deploy/run", post(deploy::run_deploy))
        .route("/deploy/retry", post(deploy::retry_fetch))
        .route("/deploy/copy", post(deploy::copy_deploy))
        .route("/deploy/cancel", post(deploy::cancel_deploy))
        .route("/deploy/group", post(deploy::change_group))
        .route("/deploy/{id}", get(deploy::get_deploy))
        .route("/deploy/{id}/events", get(events::stream_deploy_events))
        // Project registry endpoints
        .route(
            "/projects",
            get(project::list_projects).post(project::register_project),
        )
        .route("/projects/search", post(project::search_projects))
        .route("/projects/{id}/branches", get(project::list_branches))
        .route(
            "/project/{id}",
            post(project::update_alias).delete(project::delete_project),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
