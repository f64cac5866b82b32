//! # ferry-api
//!
//! HTTP surface of the bridge. ActivityPub servers read actors, notes and
//! collections and post to the shared inbox; Nostr clients use the relay
//! WebSocket, NIP-05 and WebFinger discovery.

pub mod routes;

use std::{sync::Arc, time::Instant};

use axum::Router;
use ferry_bridge::Bridge;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge, started_at: Instant::now() }
    }
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::actors::router())
        .merge(routes::notes::router())
        .merge(routes::inbox::router())
        .merge(routes::well_known::router())
        .merge(routes::relay::router())
        .merge(routes::health::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(Arc::new(state))
}
