//! Project registry entry

use serde::{Deserialize, Serialize};

/// A known remote project that can be added to deploys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryProject {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
    pub alias: String,
    pub full_path: String,
}
