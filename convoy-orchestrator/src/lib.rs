//! Convoy Orchestrator
//!
//! Runs multi-project deploys against a GitLab-compatible CI platform:
//! projects are released group by group, dependent groups wait for their
//! prerequisite group's CI stage, and a background poller mirrors pipelines
//! until the deploy converged.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;
pub mod repository;
pub mod service;
pub mod store;
