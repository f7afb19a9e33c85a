//! Deploy Repository
//!
//! Handles all database operations on `deploy_info`.

use chrono::{DateTime, Utc};
use convoy_core::domain::{Deploy, DeployStatus};
use sqlx::PgExecutor;

use super::parse_column;
use crate::store::{StoreError, StoreResult};

/// Insert a pending deploy and return its id
pub async fn insert<'e, E>(executor: E, description: &str, body: &str) -> StoreResult<i64>
where
    E: PgExecutor<'e>,
{
    let now = Utc::now();

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO deploy_info (status, description, body, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING id
        "#,
    )
    .bind(DeployStatus::Pending.as_str())
    .bind(description)
    .bind(body)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Find a deploy by ID
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> StoreResult<Option<Deploy>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, DeployRow>(
        r#"
        SELECT id, status, description, body, created_at, updated_at
        FROM deploy_info
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Deploy::try_from).transpose()
}

/// List deploys, newest first
pub async fn list_page<'e, E>(executor: E, offset: i64, limit: i64) -> StoreResult<Vec<Deploy>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, DeployRow>(
        r#"
        SELECT id, status, description, body, created_at, updated_at
        FROM deploy_info
        ORDER BY id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Deploy::try_from).collect()
}

/// Update deploy status
pub async fn update_status<'e, E>(executor: E, id: i64, status: DeployStatus) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE deploy_info SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Update deploy description
pub async fn update_description<'e, E>(executor: E, id: i64, description: &str) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result =
        sqlx::query("UPDATE deploy_info SET description = $1, updated_at = $2 WHERE id = $3")
            .bind(description)
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Bump `updated_at` without changing anything else
pub async fn touch<'e, E>(executor: E, id: i64) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE deploy_info SET updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DeployRow {
    id: i64,
    status: String,
    description: String,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeployRow> for Deploy {
    type Error = StoreError;

    fn try_from(row: DeployRow) -> Result<Self, Self::Error> {
        Ok(Deploy {
            id: row.id,
            status: parse_column("deploy_info.status", &row.status)?,
            description: row.description,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
