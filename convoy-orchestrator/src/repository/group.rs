//! Group Repository
//!
//! Handles all database operations on `group_deploy_depend`.

use convoy_core::domain::{DependType, Group};
use sqlx::PgExecutor;

use super::parse_column;
use crate::store::{NewGroupRecord, StoreError, StoreResult};

/// Insert a group and return its id
pub async fn insert<'e, E>(executor: E, deploy_id: i64, group: &NewGroupRecord) -> StoreResult<i64>
where
    E: PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO group_deploy_depend (deploy_id, group_index, depend_group_index, depend_type)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(deploy_id)
    .bind(group.group_index)
    .bind(group.depend_group_index)
    .bind(group.depend_type.map(|t| t.as_str()))
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Overwrite ordering and dependency fields of a group
pub async fn update<'e, E>(executor: E, id: i64, group: &NewGroupRecord) -> StoreResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE group_deploy_depend
        SET group_index = $1, depend_group_index = $2, depend_type = $3
        WHERE id = $4
        "#,
    )
    .bind(group.group_index)
    .bind(group.depend_group_index)
    .bind(group.depend_type.map(|t| t.as_str()))
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Find a group by ID
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> StoreResult<Option<Group>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT id, deploy_id, group_index, depend_group_index, depend_type
        FROM group_deploy_depend
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Group::try_from).transpose()
}

/// Find a group by its position in a deploy
pub async fn find_by_index<'e, E>(
    executor: E,
    deploy_id: i64,
    group_index: i32,
) -> StoreResult<Option<Group>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT id, deploy_id, group_index, depend_group_index, depend_type
        FROM group_deploy_depend
        WHERE deploy_id = $1 AND group_index = $2
        "#,
    )
    .bind(deploy_id)
    .bind(group_index)
    .fetch_optional(executor)
    .await?;

    row.map(Group::try_from).transpose()
}

/// List groups of a deploy in execution order
pub async fn find_by_deploy<'e, E>(executor: E, deploy_id: i64) -> StoreResult<Vec<Group>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT id, deploy_id, group_index, depend_group_index, depend_type
        FROM group_deploy_depend
        WHERE deploy_id = $1
        ORDER BY group_index ASC, id ASC
        "#,
    )
    .bind(deploy_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Group::try_from).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    deploy_id: i64,
    group_index: i32,
    depend_group_index: Option<i32>,
    depend_type: Option<String>,
}

impl TryFrom<GroupRow> for Group {
    type Error = StoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let depend_type = row
            .depend_type
            .as_deref()
            .map(|raw| parse_column::<DependType>("group_deploy_depend.depend_type", raw))
            .transpose()?;

        Ok(Group {
            id: row.id,
            deploy_id: row.deploy_id,
            group_index: row.group_index,
            depend_group_index: row.depend_group_index,
            depend_type,
        })
    }
}
