//! offcache server entry point.
//!
//! Boots the worker over the configured SQLite store, attempts the initial
//! install, then serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{ClientRegistry, FetchClient, FetchConfig, Worker};
use offcache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
#[cfg(test)]
mod testing;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        scope = %config.scope,
        static_namespace = %config.static_namespace(),
        dynamic_namespace = %config.dynamic_namespace(),
        "Starting offcache server on stdio transport"
    );

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let origin = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let clients = Arc::new(ClientRegistry::new());

    let mut session = clients.connect();
    tokio::spawn(async move {
        while let Some(message) = session.recv().await {
            tracing::info!(session = session.id(), controlled = session.is_controlled(), ?message, "client notified");
        }
    });

    let worker = Arc::new(Worker::new(&config, store, origin, clients)?);

    let report = worker.bring_up().await?;
    if !report.install.is_success() {
        tracing::warn!("initial install failed, will retry on first fetch");
    }

    let handler = handler::OffcacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
