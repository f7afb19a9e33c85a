//! Deploy domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::DeployStatus;

/// One release request spanning one or more dependency-ordered groups
///
/// `body` keeps the original submission verbatim so a deploy can be copied
/// or replayed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deploy {
    pub id: i64,
    pub status: DeployStatus,
    pub description: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
