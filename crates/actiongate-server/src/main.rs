//! actiongate server.
//!
//! Run with: cargo run -p actiongate-server -- --port 8080
//! Build with `--features sqlite` and set `DATABASE_URL` for persistent storage.

use std::{net::SocketAddr, sync::Arc};

use actiongate_core::Storage;
use actiongate_dispatch::Dispatcher;
use actiongate_executor::ActionExecutor;
use actiongate_server::{AppState, ServerConfig, build_router};
use actiongate_session::{Authenticator, SessionStore, spawn_sweeper};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::parse();
    if config.uses_default_password() {
        tracing::warn!("Using the default admin password; set ADMIN_PASSWORD");
    }

    let storage = open_storage(&config).await?;
    let executor = ActionExecutor::new(config.executor_config())
        .context("failed to build the action executor")?;
    let sessions =
        Arc::new(SessionStore::with_system_clock().with_idle_timeout(config.session_idle_timeout()));
    let authenticator = Authenticator::new(config.admin_username.clone(), &config.password_secret()?);

    let sweeper = spawn_sweeper(Arc::clone(&sessions), config.sweep_interval());

    let state = AppState::new(Dispatcher::new(storage, executor), sessions, authenticator);
    let app = build_router(state);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    served.context("server error")
}

#[cfg(feature = "sqlite")]
async fn open_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn Storage>> {
    use actiongate_dispatch::storage::{MemoryStorage, SqliteStorage};

    if let Some(url) = &config.database_url {
        let storage = SqliteStorage::connect(url)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        tracing::info!(%url, "Using SQLite storage");
        return Ok(Arc::new(storage));
    }
    tracing::info!("No DATABASE_URL set; using in-memory storage");
    Ok(Arc::new(MemoryStorage::new()))
}

#[cfg(not(feature = "sqlite"))]
async fn open_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn Storage>> {
    use actiongate_dispatch::storage::MemoryStorage;

    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is ignored without the sqlite feature");
    }
    tracing::info!("Using in-memory storage; definitions are lost on restart");
    Ok(Arc::new(MemoryStorage::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
