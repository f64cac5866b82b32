//! Actor documents and their collections.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/actor/{pubkey}` | Person document for a Nostr profile |
//! | GET | `/actor/{pubkey}/followers` | ActivityPub followers |
//! | GET | `/actor/{pubkey}/following` | Contact list as actor URLs |
//! | GET | `/actor/{pubkey}/outbox` | Newest notes wrapped in `Create` |

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use ferry_common::FerryResult;

use super::{ActivityJson, PageQuery};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actor/{pubkey}", get(actor))
        .route("/actor/{pubkey}/followers", get(followers))
        .route("/actor/{pubkey}/following", get(following))
        .route("/actor/{pubkey}/outbox", get(outbox))
}

async fn actor(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
) -> FerryResult<impl IntoResponse> {
    Ok(ActivityJson(state.bridge.actor_document(&pubkey).await?))
}

async fn followers(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Query(query): Query<PageQuery>,
) -> FerryResult<impl IntoResponse> {
    Ok(ActivityJson(state.bridge.followers(&pubkey, query.paged()).await?))
}

async fn following(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Query(query): Query<PageQuery>,
) -> FerryResult<impl IntoResponse> {
    Ok(ActivityJson(state.bridge.following(&pubkey, query.paged()).await?))
}

async fn outbox(
    State(state): State<Arc<AppState>>,
    Path(pubkey): Path<String>,
    Query(query): Query<PageQuery>,
) -> FerryResult<impl IntoResponse> {
    Ok(ActivityJson(state.bridge.outbox(&pubkey, query.paged()).await?))
}
