//! Personal Nostr gateway daemon.
//!
//! Loads config, builds the concrete (in-memory) stores and an
//! `nostr_sdk::Client`, wires them into a `gateway_core::SyncEngine`, and
//! runs until a shutdown signal arrives. The protocol servers that would
//! actually expose this gateway's content (Gopher/Gemini/Finger/static
//! export) are out of scope here; this binary only proves the core is
//! runnable standalone and exposes the read-only query/diagnostics surface
//! such a server would sit in front of.

mod config;
mod logging;

use std::sync::Arc;

use config::GatewayConfig;
use gateway_core::capability::CapabilityProbe;
use gateway_core::graph_engine::GraphEngine;
use gateway_core::retention_manager::RetentionManager;
use gateway_core::store::{
    InMemoryAggregateStore, InMemoryCursorStore, InMemoryEventStore, InMemoryRelayCapabilityCache,
    InMemoryRelayHintStore, InMemoryRetentionMetadataStore, InMemorySocialGraphStore,
};
use gateway_core::sync::{SyncEngine, SyncEngineDeps};
use nostr_sdk::Client;
use tracing::{error, info};

const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = run().await {
        error!(error = %err, "gateway exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let file_config = GatewayConfig::load(&config_path)?;
    let (owner, secret_key, sync_config) = file_config.resolve()?;
    // `db_path` only matters once a durable EventStore backend replaces
    // the in-memory one this binary wires up; resolved here so it at
    // least round-trips through config/env and shows up in logs.
    let db_path = file_config.db_path();
    info!(%owner, db_path, "loaded gateway configuration");

    // A client needs a signer even for a read-only gateway (NIP-42 relay
    // auth, if a relay requires it); an ephemeral keypair is sufficient
    // when no owner nsec was configured, since this binary never
    // publishes on the owner's behalf (see DESIGN.md).
    let signer = match secret_key {
        Some(secret_key) => nostr::Keys::new(secret_key),
        None => nostr::Keys::generate(),
    };
    let client = Client::builder().signer(signer).build();

    let event_store = Arc::new(InMemoryEventStore::new());
    let relay_hints = Arc::new(InMemoryRelayHintStore::new());
    let capability_cache = Arc::new(InMemoryRelayCapabilityCache::new());
    let cursors = Arc::new(InMemoryCursorStore::new());
    let aggregates = Arc::new(InMemoryAggregateStore::new());
    let social_graph = Arc::new(InMemorySocialGraphStore::new());
    let retention_metadata = Arc::new(InMemoryRetentionMetadataStore::new());

    let graph = Arc::new(GraphEngine::new(social_graph));
    let capability_probe = Arc::new(CapabilityProbe::new(capability_cache.clone()));

    let retention_manager = Arc::new(RetentionManager::new(
        owner,
        sync_config.sync.retention.clone(),
        event_store.clone(),
        retention_metadata,
        aggregates.clone(),
        graph.clone(),
    ));

    let engine = SyncEngine::new(SyncEngineDeps {
        owner,
        client,
        config: sync_config,
        event_store,
        relay_hints,
        capability_cache,
        cursors,
        aggregates,
        graph,
        capability_probe,
    });
    engine.set_retention_evaluator(retention_manager).await;

    engine.start().await?;
    info!("gateway running, waiting for shutdown signal");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping engine");
    engine.stop().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
