//! Cached remote job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local mirror of a remote job, keyed by the remote job id
///
/// The remote side keeps every retry of a job as a separate id with the
/// same name, so callers that care about the current outcome should look at
/// the highest id per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub deploy_id: i64,
    pub project_id: i64,
    pub pipeline_id: i64,
    pub name: String,
    pub stage: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub web_url: String,
}
