//! Discovery: WebFinger for bridged Nostr users, NIP-05 for bridged
//! ActivityPub accounts.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use ferry_common::{FerryError, FerryResult};
use serde::Deserialize;

use super::typed_json;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/nostr.json", get(nostr_json))
}

#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    resource: Option<String>,
}

/// `GET /.well-known/webfinger?resource=acct:{pubkey}@{host}`
async fn webfinger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebFingerQuery>,
) -> FerryResult<impl IntoResponse> {
    let resource = query
        .resource
        .ok_or_else(|| FerryError::validation("missing the ?resource= query value"))?;
    let doc = state.bridge.webfinger(&resource)?;
    Ok(typed_json(&doc, "application/jrd+json"))
}

#[derive(Debug, Deserialize)]
struct Nip05Query {
    name: Option<String>,
}

/// `GET /.well-known/nostr.json?name={user}_at_{domain}`
async fn nostr_json(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Nip05Query>,
) -> FerryResult<impl IntoResponse> {
    let doc = state.bridge.nip05(query.name.as_deref().unwrap_or_default()).await?;
    Ok(Json(doc))
}
