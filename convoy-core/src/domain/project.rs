//! Project-in-deploy domain types

use serde::{Deserialize, Serialize};

use super::status::DeployStatus;

/// One release unit within a deploy
///
/// `actual_tag`, `pipeline_id` and `status` start empty/pending and are only
/// written by the project runner and the status poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployProject {
    pub id: i64,
    pub deploy_id: i64,
    pub group_index: i32,
    pub project_id: i64,
    pub project_name: String,
    pub branch: String,
    pub tag_prefix: String,
    pub actual_tag: Option<String>,
    pub pipeline_id: Option<i64>,
    pub status: DeployStatus,
}
