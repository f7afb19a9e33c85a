//! Deploy DTOs

use serde::{Deserialize, Serialize};

use crate::domain::{
    Deploy, DependType, DeployProject, Group, JobRecord, PipelineRecord,
};

use super::remote::RemoteTarget;

/// Submission of a complete deploy (groups and projects in one payload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFullDeploy {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub groups: Vec<NewGroup>,
    #[serde(default)]
    pub projects: Vec<NewProject>,
}

/// Group ordering and dependency as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub group_index: i32,
    #[serde(default)]
    pub depend_group_index: Option<i32>,
    #[serde(default)]
    pub depend_type: Option<DependType>,
}

/// Project as submitted
///
/// `project_name` is only a fallback; the registry name wins when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub group_index: i32,
    pub project_id: i64,
    #[serde(default)]
    pub project_name: Option<String>,
    pub branch: String,
    pub tag_prefix: String,
}

/// Upsert of one group and reconciliation of its project set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDeployChange {
    pub deploy_id: i64,
    /// Existing group row to update; `None` creates a new group
    #[serde(default)]
    pub group_id: Option<i64>,
    pub group_index: i32,
    #[serde(default)]
    pub depend_group_index: Option<i32>,
    #[serde(default)]
    pub depend_type: Option<DependType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub projects: Vec<ChangeProject>,
}

/// Target state of one project in a group change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProject {
    pub project_id: i64,
    #[serde(default)]
    pub project_name: Option<String>,
    pub branch: String,
    pub tag_prefix: String,
}

/// Request to run or re-check a deploy against a remote CI host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDeployRequest {
    pub id: i64,
    #[serde(flatten)]
    pub target: RemoteTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyDeployRequest {
    pub from_id: i64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelDeployRequest {
    pub id: i64,
}

/// Result of one status poll pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollOutcome {
    /// Not every project is done yet; poll again later
    Next,
    Success,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryFetchResult {
    pub ok: bool,
    pub id: i64,
    pub outcome: PollOutcome,
}

/// Full view of a deploy and everything cached for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployDetail {
    pub deploy: Deploy,
    pub groups: Vec<Group>,
    pub projects: Vec<DeployProject>,
    pub pipelines: Vec<PipelineRecord>,
    pub jobs: Vec<JobRecord>,
    pub groups_detailed: Vec<GroupDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub projects: Vec<DeployProject>,
}
