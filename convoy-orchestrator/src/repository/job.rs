//! Job Repository
//!
//! Handles all database operations on `job_info`, the local mirror of remote
//! jobs.

use chrono::{DateTime, Utc};
use convoy_core::domain::JobRecord;
use sqlx::PgExecutor;

use crate::store::StoreResult;

/// Insert a job or refresh the mirrored fields of an existing one
pub async fn upsert<'e, E>(executor: E, job: &JobRecord) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO job_info (
            id, deploy_id, project_id, pipeline_id, name, stage,
            status, created_at, updated_at, web_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            deploy_id = EXCLUDED.deploy_id,
            project_id = EXCLUDED.project_id,
            pipeline_id = EXCLUDED.pipeline_id,
            name = EXCLUDED.name,
            stage = EXCLUDED.stage,
            status = EXCLUDED.status,
            created_at = EXCLUDED.created_at,
            updated_at = EXCLUDED.updated_at,
            web_url = EXCLUDED.web_url
        "#,
    )
    .bind(job.id)
    .bind(job.deploy_id)
    .bind(job.project_id)
    .bind(job.pipeline_id)
    .bind(&job.name)
    .bind(&job.stage)
    .bind(&job.status)
    .bind(job.created_at)
    .bind(job.updated_at)
    .bind(&job.web_url)
    .execute(executor)
    .await?;

    Ok(())
}

/// List jobs cached for a deploy
pub async fn find_by_deploy<'e, E>(executor: E, deploy_id: i64) -> StoreResult<Vec<JobRecord>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, deploy_id, project_id, pipeline_id, name, stage,
               status, created_at, updated_at, web_url
        FROM job_info
        WHERE deploy_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(deploy_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// List jobs of one pipeline whose stage contains `stage_like`
pub async fn find_by_stage<'e, E>(
    executor: E,
    deploy_id: i64,
    pipeline_id: i64,
    stage_like: &str,
) -> StoreResult<Vec<JobRecord>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, deploy_id, project_id, pipeline_id, name, stage,
               status, created_at, updated_at, web_url
        FROM job_info
        WHERE deploy_id = $1 AND pipeline_id = $2 AND strpos(stage, $3) > 0
        ORDER BY id ASC
        "#,
    )
    .bind(deploy_id)
    .bind(pipeline_id)
    .bind(stage_like)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    deploy_id: i64,
    project_id: i64,
    pipeline_id: i64,
    name: String,
    stage: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    web_url: String,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            deploy_id: row.deploy_id,
            project_id: row.project_id,
            pipeline_id: row.pipeline_id,
            name: row.name,
            stage: row.stage,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            web_url: row.web_url,
        }
    }
}
