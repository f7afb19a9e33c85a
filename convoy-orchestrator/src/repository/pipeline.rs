//! Pipeline Repository
//!
//! Handles all database operations on `pipeline_info`, the local mirror of
//! remote pipelines.

use chrono::{DateTime, Utc};
use convoy_core::domain::PipelineRecord;
use sqlx::PgExecutor;

use crate::store::StoreResult;

/// Insert a pipeline or refresh the mirrored fields of an existing one
pub async fn upsert<'e, E>(executor: E, pipeline: &PipelineRecord) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO pipeline_info (id, deploy_id, project_id, status, user_name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            user_name = EXCLUDED.user_name,
            created_at = EXCLUDED.created_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(pipeline.id)
    .bind(pipeline.deploy_id)
    .bind(pipeline.project_id)
    .bind(&pipeline.status)
    .bind(&pipeline.user_name)
    .bind(pipeline.created_at)
    .bind(pipeline.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// List pipelines cached for a deploy
pub async fn find_by_deploy<'e, E>(executor: E, deploy_id: i64) -> StoreResult<Vec<PipelineRecord>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, deploy_id, project_id, status, user_name, created_at, updated_at
        FROM pipeline_info
        WHERE deploy_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(deploy_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: i64,
    deploy_id: i64,
    project_id: i64,
    status: String,
    user_name: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<PipelineRow> for PipelineRecord {
    fn from(row: PipelineRow) -> Self {
        PipelineRecord {
            id: row.id,
            deploy_id: row.deploy_id,
            project_id: row.project_id,
            status: row.status,
            user_name: row.user_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
