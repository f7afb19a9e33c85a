//! Group domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::status::ParseStatusError;

/// An ordered batch of projects within a deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub deploy_id: i64,
    pub group_index: i32,
    pub depend_group_index: Option<i32>,
    pub depend_type: Option<DependType>,
}

/// Which CI stage of the prerequisite group gates this group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependType {
    PreBuildAll,
    PreDeployAll,
}

impl DependType {
    /// Substring matched against job stage names
    pub fn gating_stage(&self) -> &'static str {
        match self {
            DependType::PreBuildAll => "build",
            DependType::PreDeployAll => "deploy",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DependType::PreBuildAll => "pre_build_all",
            DependType::PreDeployAll => "pre_deploy_all",
        }
    }
}

impl fmt::Display for DependType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_build_all" => Ok(DependType::PreBuildAll),
            "pre_deploy_all" => Ok(DependType::PreDeployAll),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gating_stage() {
        assert_eq!(DependType::PreBuildAll.gating_stage(), "build");
        assert_eq!(DependType::PreDeployAll.gating_stage(), "deploy");
    }

    #[test]
    fn test_depend_type_serde() {
        let parsed: DependType = serde_json::from_str("\"pre_deploy_all\"").unwrap();
        assert_eq!(parsed, DependType::PreDeployAll);
        assert!(serde_json::from_str::<DependType>("\"post_all\"").is_err());
    }
}
