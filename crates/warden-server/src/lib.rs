//! Management-plane server for the distributed DHCP fleet: REST CRUD over
//! subnets, pools, reservations and admission policies, capacity accounting,
//! and command fan-out to the remote agent nodes.

pub mod agent;
pub mod config;
pub mod conflict;
pub mod db;
pub mod event_manager;
pub mod handlers;
pub mod identity;
pub mod ledger;
pub mod services;
#[cfg(test)]
pub mod test_helpers;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::{AgentChannel, HttpAgentChannel, NodeRegistry};
use crate::event_manager::EventManager;

pub use crate::config::ServerConfig;

/// Shared handles passed to every handler and service. Constructed once at
/// startup; no package-level mutable state.
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub agents: Arc<dyn AgentChannel>,
    pub nodes: Arc<NodeRegistry>,
    pub events: EventManager,
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let db = db::init_db(&config.database_path).await?;

    let agents: Arc<dyn AgentChannel> = Arc::new(HttpAgentChannel::new(config.agent_timeout_secs)?);
    let nodes = Arc::new(NodeRegistry::new());
    {
        let mut conn = db.acquire().await?;
        for seed in &config.nodes {
            db::upsert_node(&mut conn, seed).await?;
        }
        let known = db::list_nodes(&mut conn).await?;
        info!("Loaded {} registered agent nodes", known.len());
        nodes.replace(known);
    }

    let state = AppState {
        db,
        agents,
        nodes,
        events: EventManager::new(),
    };

    let app = handlers::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("Listening on {}", config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
