//! Project Repository
//!
//! Handles all database operations on `deploy_project`, the projects taking
//! part in a deploy.

use convoy_core::domain::{DeployProject, DeployStatus};
use sqlx::PgExecutor;

use super::parse_column;
use crate::store::{NewProjectRecord, ProjectUpdate, StoreError, StoreResult};

/// Insert a pending project row
pub async fn insert<'e, E>(
    executor: E,
    deploy_id: i64,
    project: &NewProjectRecord,
) -> StoreResult<i64>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO deploy_project (
            deploy_id, group_index, project_id, project_name,
            branch, tag_prefix, actual_tag, pipeline_id, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, NULL, NULL, $7)
        RETURNING id
        "#,
    )
    .bind(deploy_id)
    .bind(project.group_index)
    .bind(project.project_id)
    .bind(&project.project_name)
    .bind(&project.branch)
    .bind(&project.tag_prefix)
    .bind(DeployStatus::Pending.as_str())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// List projects of a deploy in insertion order
pub async fn find_by_deploy<'e, E>(executor: E, deploy_id: i64) -> StoreResult<Vec<DeployProject>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, deploy_id, group_index, project_id, project_name,
               branch, tag_prefix, actual_tag, pipeline_id, status
        FROM deploy_project
        WHERE deploy_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(deploy_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(DeployProject::try_from).collect()
}

/// List projects of one group in insertion order
pub async fn find_by_group<'e, E>(
    executor: E,
    deploy_id: i64,
    group_index: i32,
) -> StoreResult<Vec<DeployProject>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, deploy_id, group_index, project_id, project_name,
               branch, tag_prefix, actual_tag, pipeline_id, status
        FROM deploy_project
        WHERE deploy_id = $1 AND group_index = $2
        ORDER BY id ASC
        "#,
    )
    .bind(deploy_id)
    .bind(group_index)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(DeployProject::try_from).collect()
}

/// Record the tag and pipeline of a triggered release
pub async fn update_release<'e, E>(
    executor: E,
    id: i64,
    actual_tag: &str,
    pipeline_id: i64,
) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE deploy_project
        SET actual_tag = $1, pipeline_id = $2, status = $3
        WHERE id = $4
        "#,
    )
    .bind(actual_tag)
    .bind(pipeline_id)
    .bind(DeployStatus::Running.as_str())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Update project status
pub async fn update_status<'e, E>(executor: E, id: i64, status: DeployStatus) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE deploy_project SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Set every project of a deploy to the same status
pub async fn update_status_by_deploy<'e, E>(
    executor: E,
    deploy_id: i64,
    status: DeployStatus,
) -> StoreResult<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE deploy_project SET status = $1 WHERE deploy_id = $2")
        .bind(status.as_str())
        .bind(deploy_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Move a project between groups and change what it releases
pub async fn update_target<'e, E>(executor: E, update: &ProjectUpdate) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE deploy_project
        SET group_index = $1, branch = $2, tag_prefix = $3
        WHERE id = $4
        "#,
    )
    .bind(update.group_index)
    .bind(&update.branch)
    .bind(&update.tag_prefix)
    .bind(update.id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete project rows by ID
pub async fn delete_many<'e, E>(executor: E, ids: &[i64]) -> StoreResult<u64>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM deploy_project WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    deploy_id: i64,
    group_index: i32,
    project_id: i64,
    project_name: String,
    branch: String,
    tag_prefix: String,
    actual_tag: Option<String>,
    pipeline_id: Option<i64>,
    status: String,
}

impl TryFrom<ProjectRow> for DeployProject {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(DeployProject {
            id: row.id,
            deploy_id: row.deploy_id,
            group_index: row.group_index,
            project_id: row.project_id,
            project_name: row.project_name,
            branch: row.branch,
            tag_prefix: row.tag_prefix,
            actual_tag: row.actual_tag,
            pipeline_id: row.pipeline_id,
            status: parse_column("deploy_project.status", &row.status)?,
        })
    }
}
