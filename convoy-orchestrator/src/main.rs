use anyhow::Context;
use convoy_client::GitLabClientFactory;
use convoy_orchestrator::{
    api,
    config::{Config, StoreBackend},
    db,
    engine::{BroadcastNotifier, Orchestrator},
    store::{DeployStore, MemoryDeployStore, PgDeployStore},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convoy_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Convoy Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn DeployStore> = match config.store {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(&config.database_url)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Arc::new(PgDeployStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, deploys are lost on restart");
            Arc::new(MemoryDeployStore::new())
        }
    };

    let events = BroadcastNotifier::default();
    let orchestrator = Orchestrator::new(
        store,
        Arc::new(GitLabClientFactory::new(config.tag_offset_hours)),
        Arc::new(events.clone()),
        config.engine.clone(),
    );

    // Build router with all API endpoints
    let app = api::create_router(api::AppState::new(
        orchestrator,
        events,
        config.gitlab.clone(),
    ));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
