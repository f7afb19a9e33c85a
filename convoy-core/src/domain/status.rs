//! Status types
//!
//! `DeployStatus` is the lifecycle shared by deploys and the projects inside
//! them. `RemoteState` is the normalized view of a remote pipeline or job
//! status string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a deploy or of a project inside a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl DeployStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStatus::Pending => "pending",
            DeployStatus::Running => "running",
            DeployStatus::Success => "success",
            DeployStatus::Failed => "failed",
            DeployStatus::Canceled => "canceled",
        }
    }

    /// Success, failed and canceled never transition automatically
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployStatus::Success | DeployStatus::Failed | DeployStatus::Canceled
        )
    }
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a persisted status string is not recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for DeployStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeployStatus::Pending),
            "running" => Ok(DeployStatus::Running),
            "success" => Ok(DeployStatus::Success),
            "failed" => Ok(DeployStatus::Failed),
            "canceled" => Ok(DeployStatus::Canceled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Normalized remote CI status
///
/// The remote side reports many intermediate states (created, pending,
/// running, manual, ...). Only success, failed and canceled matter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Success,
    Failed,
    Canceled,
    InProgress,
}

impl RemoteState {
    /// Case-insensitive mapping of a remote status string
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => RemoteState::Success,
            "failed" => RemoteState::Failed,
            "canceled" | "cancelled" => RemoteState::Canceled,
            _ => RemoteState::InProgress,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RemoteState::Failed | RemoteState::Canceled)
    }
}
