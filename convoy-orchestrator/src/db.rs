use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create deploys table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deploy_info (
            id BIGSERIAL PRIMARY KEY,
            status VARCHAR(20) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create groups table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_deploy_depend (
            id BIGSERIAL PRIMARY KEY,
            deploy_id BIGINT NOT NULL REFERENCES deploy_info(id) ON DELETE CASCADE,
            group_index INTEGER NOT NULL,
            depend_group_index INTEGER,
            depend_type VARCHAR(32),
            UNIQUE (deploy_id, group_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create deploy projects table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deploy_project (
            id BIGSERIAL PRIMARY KEY,
            deploy_id BIGINT NOT NULL REFERENCES deploy_info(id) ON DELETE CASCADE,
            group_index INTEGER NOT NULL,
            project_id BIGINT NOT NULL,
            project_name VARCHAR(255) NOT NULL DEFAULT '',
            branch VARCHAR(255) NOT NULL,
            tag_prefix VARCHAR(255) NOT NULL,
            actual_tag VARCHAR(255),
            pipeline_id BIGINT,
            status VARCHAR(20) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Remote mirrors keep the remote ids as primary keys
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_info (
            id BIGINT PRIMARY KEY,
            deploy_id BIGINT NOT NULL REFERENCES deploy_info(id) ON DELETE CASCADE,
            project_id BIGINT NOT NULL,
            status VARCHAR(50) NOT NULL,
            user_name VARCHAR(255) NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_info (
            id BIGINT PRIMARY KEY,
            deploy_id BIGINT NOT NULL REFERENCES deploy_info(id) ON DELETE CASCADE,
            project_id BIGINT NOT NULL,
            pipeline_id BIGINT NOT NULL,
            name VARCHAR(255) NOT NULL,
            stage VARCHAR(255) NOT NULL,
            status VARCHAR(50) NOT NULL,
            created_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ,
            web_url TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create project registry table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_info (
            id BIGINT PRIMARY KEY,
            group_id BIGINT NOT NULL,
            name VARCHAR(255) NOT NULL,
            alias VARCHAR(255) NOT NULL DEFAULT '',
            full_path VARCHAR(512) NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for the engine's lookups
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_deploy_project_group ON deploy_project(deploy_id, group_index)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_info_pipeline ON job_info(deploy_id, pipeline_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_project_info_group ON project_info(group_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
