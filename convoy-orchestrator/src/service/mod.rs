//! Service Module
//!
//! Read-side and registry operations that need no orchestration. Services
//! take the store (and a release client where the remote is involved) and
//! return engine errors so the API maps them uniformly.

pub mod project;
pub mod query;

// Re-export for convenience
pub use project as project_service;
pub use query as query_service;
