//! `POST /inbox`: the shared inbox.
//!
//! Remote servers post `application/activity+json`, so the body is read raw
//! and parsed here rather than through the `Json` extractor.
//!
//! | Status | When |
//! |--------|------|
//! | 200 | handled, or an activity type we do not act on |
//! | 400 | unreadable activity, follower without inbox |
//! | 404 | Follow of something that is not a local actor |
//! | 500 | persistence failure |
//! | 503 | the Accept could not be delivered |

use std::sync::Arc;

use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use ferry_common::{FerryError, FerryResult};
use serde_json::Value;
use tracing::debug;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/inbox", post(inbox))
}

async fn inbox(State(state): State<Arc<AppState>>, body: Bytes) -> FerryResult<StatusCode> {
    let activity: Value = serde_json::from_slice(&body)
        .map_err(|e| FerryError::validation(format!("body is not JSON: {e}")))?;
    let outcome = state.bridge.handle_inbox(&activity).await?;
    debug!("Inbox: {:?}", outcome);
    Ok(StatusCode::OK)
}
