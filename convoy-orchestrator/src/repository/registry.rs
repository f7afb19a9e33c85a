//! Registry Repository
//!
//! Handles all database operations on `project_info`, the registry of known
//! remote projects.

use convoy_core::domain::RegistryProject;
use sqlx::PgExecutor;

use crate::store::StoreResult;

pub async fn insert<'e, E>(executor: E, project: &RegistryProject) -> StoreResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO project_info (id, group_id, name, alias, full_path)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(project.id)
    .bind(project.group_id)
    .bind(&project.name)
    .bind(&project.alias)
    .bind(&project.full_path)
    .execute(executor)
    .await?;

    Ok(())
}

/// List registry projects belonging to a remote group
pub async fn find_by_group<'e, E>(executor: E, group_id: i64) -> StoreResult<Vec<RegistryProject>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, RegistryRow>(
        r#"
        SELECT id, group_id, name, alias, full_path
        FROM project_info
        WHERE group_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Names of the given projects; unknown ids are skipped
pub async fn find_names<'e, E>(executor: E, ids: &[i64]) -> StoreResult<Vec<(i64, String)>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, name FROM project_info WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn update_alias<'e, E>(executor: E, id: i64, alias: &str) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE project_info SET alias = $1 WHERE id = $2")
        .bind(alias)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete<'e, E>(executor: E, id: i64) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM project_info WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RegistryRow {
    id: i64,
    group_id: i64,
    name: String,
    alias: String,
    full_path: String,
}

impl From<RegistryRow> for RegistryProject {
    fn from(row: RegistryRow) -> Self {
        RegistryProject {
            id: row.id,
            group_id: row.group_id,
            name: row.name,
            alias: row.alias,
            full_path: row.full_path,
        }
    }
}
