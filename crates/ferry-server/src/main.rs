//! # Ferry Server
//!
//! Main binary. Runs the bridge in a single process:
//! - ActivityPub routes, WebFinger and NIP-05 (HTTP)
//! - The bridge relay endpoint (WebSocket on `/relay`)
//! - The cache expiry loop
//!
//! Without `database.url` the bridge runs on the in-memory store.

use std::{net::SocketAddr, sync::Arc};

use clap::{Parser, Subcommand};
use ferry_api::{AppState, build_router};
use ferry_bridge::{Bridge, BridgeDeps, KeyManager, RelayStorage};
use ferry_common::config::AppConfig;
use ferry_db::{BridgeStore, Database, MemoryStore};
use ferry_nostr::{PeerPool, PeerPoolConfig, WsRelayConnector};
use ferry_pub::HttpPubClient;

#[derive(Parser)]
#[command(name = "ferry", version, about = "Nostr and ActivityPub protocol bridge")]
struct Cli {
    /// Config file, without extension (defaults to `ferry`).
    #[arg(short, long, env = "FERRY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    init_tracing(&config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => migrate(&config).await,
        Command::Serve => serve(config).await,
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ferry=debug,tower_http=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("database.url is not set"))?;
    let db = Database::connect(url, config.database.max_connections, config.database.min_connections)
        .await?;
    db.migrate().await
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BridgeStore>> {
    match config.database.url.as_deref() {
        Some(url) => {
            let db = Database::connect(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;
            db.migrate().await?;
            Ok(Arc::new(db.store()))
        }
        None => {
            tracing::warn!("database.url is not set; state will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Ferry v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("   Service URL: {}", config.server.service_url);
    tracing::info!("   Relay URL:   {}", config.server.relay_url);

    let store = open_store(&config).await?;

    // Load the active Ed25519 key, or generate + persist one on first run.
    let server_key = KeyManager::new(store.clone()).load_or_generate().await?;
    tracing::info!("Server signing key ready ({})", server_key.key_id);

    let http = Arc::new(HttpPubClient::new(server_key.clone())?);
    let peers = Arc::new(PeerPool::new(
        config.peers.relays.clone(),
        Arc::new(WsRelayConnector::new()),
        PeerPoolConfig { attempts: config.peers.attempts, timeout: config.peers.timeout() },
    ));
    tracing::info!("{} peer relays configured", config.peers.relays.len());

    let bridge = Arc::new(Bridge::new(
        &config,
        BridgeDeps { store, peers, client: http.clone(), delivery: http, server_key },
    )?);
    bridge.storage.init().await?;

    let _gc = bridge.cache.spawn_gc(config.bridge.cache_gc_interval());

    let router = build_router(AppState::new(bridge));
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
