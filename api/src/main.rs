use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;

use api::catalog::PgCatalogSource;
use api::config::ApiConfig;
use api::observability::Observability;
use api::rate_limit::RateLimitState;
use api::routes::{self, RouterSettings};
use api::state::AppState;
use api::validation::PlatformRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let obs = Observability::init()?;
    let config = ApiConfig::from_env()?;

    if !PlatformRegistry::install(config.platforms.clone()) {
        tracing::warn!("Platform registry was already initialized; keeping the existing one");
    }

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to the catalog database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("applying migrations")?;

    tracing::info!("Database connected and migrations applied");

    let state = AppState::new(Arc::new(PgCatalogSource::new(pool)), obs.registry.clone());
    let settings = RouterSettings {
        api_prefix: config.api_prefix.clone(),
        max_request_bytes: config.max_request_bytes,
        cors_origins: config.cors_origins.clone(),
        rate_limit: RateLimitState::from_env(&config.api_prefix),
    };
    let app = routes::build_router(state, settings);

    tracing::info!("API server listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    obs.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
