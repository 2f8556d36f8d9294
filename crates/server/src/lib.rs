//! The sqlyard HTTP layer.
//!
//! Exposes the execution core over REST:
//! - **Query submission** (`POST /query`): async, returns a task id to poll.
//! - **Database and extension management** under `/db` and `/extensions`.
//! - **Dialect tools** under `/tools`.
//!
//! Everything except `/health` requires the configured API key.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use sqlyard_common::config::AppConfig;
use sqlyard_core::{
    CacheConfig, ConnectionRegistry, EngineOptions, ExpirySweeper, QueryEngine,
};

pub mod api;
pub mod auth;

pub use api::create_api_router;

/// Shared handler state.
pub struct AppState {
    pub engine: QueryEngine,
    pub api_key: String,
}

/// Builder for the sqlyard service.
pub struct SqlyardServer {
    config_path: String,
}

impl Default for SqlyardServer {
    fn default() -> Self {
        Self {
            config_path: "config/sqlyard.yaml".to_string(),
        }
    }
}

impl SqlyardServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Load configuration, bootstrap the engine and serve until interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        sqlyard_common::telemetry::init_tracing();

        let config = AppConfig::from_file(&self.config_path)
            .with_context(|| format!("Loading configuration from {}", self.config_path))?;

        let engine = build_engine(&config)?;
        let state = Arc::new(AppState {
            engine: engine.clone(),
            api_key: config.server.api_key.clone(),
        });

        let sweeper = ExpirySweeper::start(
            engine.cache().clone(),
            Duration::from_secs(config.cache.sweep_interval_secs),
        );

        let router = create_api_router(state);
        let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
            .await
            .with_context(|| format!("Binding {}", config.server.listen_addr))?;

        info!(
            addr = %config.server.listen_addr,
            name = %config.server.name,
            "sqlyard listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Serving HTTP")?;

        sweeper.stop();
        info!("Shutdown complete");
        Ok(())
    }
}

/// Build the engine from configuration and ensure the default database and
/// the storage directories exist.
pub fn build_engine(config: &AppConfig) -> anyhow::Result<QueryEngine> {
    std::fs::create_dir_all(&config.storage.db_dir)
        .with_context(|| format!("Creating {}", config.storage.db_dir))?;
    std::fs::create_dir_all(&config.storage.extensions_dir)
        .with_context(|| format!("Creating {}", config.storage.extensions_dir))?;

    let registry = Arc::new(ConnectionRegistry::new(
        config.storage.db_dir.clone(),
        config.storage.extensions_dir.clone(),
    ));
    registry
        .create_database("default")
        .context("Bootstrapping default database")?;

    // Warm a handle per existing database so extensions load up front.
    for name in registry.database_names() {
        if let Err(e) = registry.handle(&name) {
            tracing::warn!(db = %name, error = %e, "Skipping database that failed to open");
        }
    }

    let engine = QueryEngine::new(
        registry,
        EngineOptions {
            max_workers: config.executor.max_workers,
            result_retention: Duration::from_secs(config.executor.result_retention_secs),
            cache: CacheConfig {
                max_entries: config.cache.max_entries,
                default_ttl_secs: config.cache.default_ttl_secs,
            },
        },
    );
    Ok(engine)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Cannot install Ctrl-C handler; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
