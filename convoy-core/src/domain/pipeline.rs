//! Cached remote pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local mirror of a remote pipeline, keyed by the remote pipeline id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: i64,
    pub deploy_id: i64,
    pub project_id: i64,
    pub status: String,
    pub user_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
