//! Live deploy events pushed to subscribers

use serde::{Deserialize, Serialize};

use super::deploy::PollOutcome;
use crate::domain::DeployStatus;

/// Orchestrator event emitted after a status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeployEvent {
    DeployStarted,
    GroupStarted {
        group_index: i32,
    },
    ProjectStarted {
        project_id: i64,
    },
    ProjectCompleted {
        project_id: i64,
        status: DeployStatus,
    },
    PollingUpdate {
        round: u32,
        outcome: PollOutcome,
    },
    #[serde(rename = "deploy_success")]
    DeploySucceeded,
    DeployFailed {
        reason: String,
    },
    DeployCanceled,
}

/// An event together with the deploy it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployEventEnvelope {
    pub deploy_id: i64,
    #[serde(flatten)]
    pub event: DeployEvent,
}
