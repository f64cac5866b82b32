//! `GET /note/{id}`: a kind-1 event as an ActivityPub Note.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use ferry_common::FerryResult;

use super::ActivityJson;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/note/{id}", get(note))
}

async fn note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> FerryResult<impl IntoResponse> {
    Ok(ActivityJson(state.bridge.note_document(&id).await?))
}
