//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > ferry.toml > defaults
//!
//! The loaded [`AppConfig`] is a plain value. `main` loads it once and hands it
//! to whatever needs it.

use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

/// Relays queried when nothing else is configured.
const DEFAULT_PEERS: &[&str] = &[
    "wss://nostr-pub.wellorder.net",
    "wss://nostr-relay.freeberty.net",
    "wss://nostr.bitcoiner.social",
    "wss://nostr-relay.wlvs.space",
    "wss://nostr.onsats.org",
    "wss://nostr-relay.untethr.me",
    "wss://nostr.semisol.dev",
    "wss://nostr-pub.semisol.dev",
    "wss://nostr-verified.wellorder.net",
    "wss://nostr.drss.io",
    "wss://relay.damus.io",
    "wss://nostr.openchain.fr",
    "wss://nostr.delo.software",
    "wss://relay.nostr.info",
    "wss://relay.minds.com/nostr/v1/ws",
    "wss://nostr.zaprite.io",
    "wss://nostr.oxtr.dev",
    "wss://nostr.ono.re",
    "wss://relay.grunch.dev",
    "wss://relay.cynsar.foundation",
    "wss://nostr.sandwich.farm",
];

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bridge: BridgeConfig,
    pub peers: PeersConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then the optional config file (`ferry.toml`
    /// unless `path` is given), then `FERRY__SECTION__KEY` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        defaults()?
            .add_source(File::with_name(path.unwrap_or("ferry")).required(false))
            // FERRY__SERVER__PORT, FERRY__DATABASE__URL, FERRY__PEERS__RELAYS=wss://a,wss://b
            .add_source(
                Environment::with_prefix("FERRY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("peers.relays")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only; ignores files and the environment.
    pub fn from_defaults() -> Result<Self, ConfigError> {
        defaults()?.build()?.try_deserialize()
    }

    /// Host part of `server.service_url`, used in handles and NIP-05 names.
    pub fn service_host(&self) -> String {
        url::Url::parse(&self.server.service_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "localhost".to_owned())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.service_url", "http://localhost:8080")?
        .set_default("server.relay_url", "ws://localhost:8080/relay")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("bridge.cache_ttl_secs", 864_000)? // 10 days
        .set_default("bridge.max_event_bytes", 10_000)?
        .set_default("bridge.outbox_page_size", 40)?
        .set_default("bridge.max_reply_depth", 8)?
        .set_default("bridge.cache_gc_interval_secs", 3_600)?
        .set_default("peers.relays", DEFAULT_PEERS.to_vec())?
        .set_default("peers.attempts", 4)?
        .set_default("peers.timeout_ms", 2_000)?
        .set_default("logging.json", false)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL of the bridge (e.g. "https://ferry.example.com").
    /// Actor, note and collection ids are minted under it.
    pub service_url: String,
    /// Public WebSocket URL of the bridge relay endpoint, used as the relay
    /// hint in `e` and `p` tags.
    pub relay_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Unset runs the bridge on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Hex-encoded identity derivation secret. Defaults to the server key seed.
    pub secret: Option<String>,
    pub cache_ttl_secs: u64,
    pub max_event_bytes: usize,
    pub outbox_page_size: usize,
    pub max_reply_depth: usize,
    pub cache_gc_interval_secs: u64,
}

impl BridgeConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_gc_interval(&self) -> Duration {
        Duration::from_secs(self.cache_gc_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PeersConfig {
    /// External relays consulted on cache misses.
    pub relays: Vec<String>,
    /// Peers contacted per query.
    pub attempts: usize,
    /// Per-peer deadline in milliseconds.
    pub timeout_ms: u64,
}

impl PeersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}
