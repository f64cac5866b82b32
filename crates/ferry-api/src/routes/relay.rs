//! `GET /relay`: the bridge's own Nostr relay endpoint.
//!
//! Every frame is answered synchronously: `EVENT` gets an `OK`, `REQ` gets
//! its stored events followed by `EOSE`. There are no live subscriptions, so
//! `CLOSE` has nothing to tear down.

use std::{collections::HashSet, sync::Arc};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use ferry_bridge::{BridgeError, RelayStorage};
use ferry_nostr::{
    Event, Filter, kind,
    message::{ClientMessage, RelayMessage},
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/relay", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let storage = state.bridge.storage.clone();
    debug!("Relay client connected");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                for reply in handle_client_message(storage.as_ref(), text.as_str()).await {
                    if sender.send(Message::Text(reply.to_json().into())).await.is_err() {
                        debug!("Relay client went away mid-reply");
                        return;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!("Relay client disconnected");
}

/// Answer one client frame.
pub async fn handle_client_message(storage: &dyn RelayStorage, text: &str) -> Vec<RelayMessage> {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::Event(event)) => vec![publish(storage, &event).await],
        Ok(ClientMessage::Req { subscription_id, filters }) => {
            request(storage, subscription_id, &filters).await
        }
        Ok(ClientMessage::Close(subscription_id)) => {
            debug!("CLOSE {}", subscription_id);
            Vec::new()
        }
        Err(e) => vec![RelayMessage::Notice(format!("error: {e}"))],
    }
}

async fn publish(storage: &dyn RelayStorage, event: &Event) -> RelayMessage {
    let ok = |accepted: bool, message: String| RelayMessage::Ok {
        event_id: event.id.clone(),
        accepted,
        message,
    };

    if !storage.accept(event) {
        return ok(false, "invalid: event rejected".into());
    }
    if let Err(e) = storage.save(event).await {
        return ok(false, rejection(&e));
    }

    if event.kind == kind::DELETION {
        for target in event.tag_values("e") {
            if let Err(e) = storage.delete(target, &event.pubkey).await {
                warn!("Deletion of {} requested by {} failed: {}", target, event.id, e);
            }
        }
    }

    info!("Accepted event {} (kind {})", event.id, event.kind);
    ok(true, String::new())
}

async fn request(
    storage: &dyn RelayStorage,
    subscription_id: String,
    filters: &[Filter],
) -> Vec<RelayMessage> {
    let mut seen = HashSet::new();
    let mut replies = Vec::new();

    for filter in filters {
        match storage.query(filter).await {
            Ok(events) => {
                for event in events {
                    if seen.insert(event.id.clone()) {
                        replies.push(RelayMessage::Event {
                            subscription_id: subscription_id.clone(),
                            event: Box::new(event),
                        });
                    }
                }
            }
            Err(e) => {
                warn!("REQ {} failed: {}", subscription_id, e);
                return vec![RelayMessage::Closed { subscription_id, message: rejection(&e) }];
            }
        }
    }

    replies.push(RelayMessage::Eose(subscription_id));
    replies
}

/// NIP-01 machine-readable prefix for a refusal.
fn rejection(err: &BridgeError) -> String {
    match err {
        BridgeError::Validation(msg) => format!("invalid: {msg}"),
        other => format!("error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_bridge::testing::{Harness, settle};
    use ferry_nostr::{EventBuilder, Keys};
    use serde_json::json;

    fn keys(byte: u8) -> Keys {
        Keys::from_secret_bytes(&[byte; 32]).unwrap()
    }

    fn note(keys: &Keys, created_at: i64, content: &str) -> Event {
        EventBuilder::new(kind::TEXT_NOTE, created_at, content).sign(keys).unwrap()
    }

    fn event_frame(event: &Event) -> String {
        json!(["EVENT", event]).to_string()
    }

    #[tokio::test]
    async fn unparseable_frames_get_a_notice() {
        let h = Harness::new();
        let replies = handle_client_message(h.bridge.storage.as_ref(), "{not json").await;
        assert!(matches!(replies.as_slice(), [RelayMessage::Notice(_)]));
    }

    #[tokio::test]
    async fn published_note_is_acknowledged_and_queryable() {
        let h = Harness::new();
        let storage = h.bridge.storage.as_ref();
        let alice = keys(1);
        let event = note(&alice, 1_700_000_000, "hello fediverse");

        let replies = handle_client_message(storage, &event_frame(&event)).await;
        match replies.as_slice() {
            [RelayMessage::Ok { event_id, accepted, .. }] => {
                assert_eq!(event_id, &event.id);
                assert!(*accepted);
            }
            other => panic!("unexpected replies {other:?}"),
        }
        settle().await;

        let req = json!(["REQ", "sub", {"authors": [alice.public_hex()], "kinds": [1]}]).to_string();
        let replies = handle_client_message(storage, &req).await;
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], RelayMessage::Event { event: e, .. } if e.id == event.id));
        assert!(matches!(&replies[1], RelayMessage::Eose(sub) if sub == "sub"));
    }

    #[tokio::test]
    async fn forged_event_is_refused_as_invalid() {
        let h = Harness::new();
        let mut event = note(&keys(1), 1_700_000_000, "original");
        event.content = "tampered".into();

        let replies = handle_client_message(h.bridge.storage.as_ref(), &event_frame(&event)).await;
        match replies.as_slice() {
            [RelayMessage::Ok { accepted, message, .. }] => {
                assert!(!*accepted);
                assert!(message.starts_with("invalid:"), "{message}");
            }
            other => panic!("unexpected replies {other:?}"),
        }
    }

    #[tokio::test]
    async fn deletion_removes_only_the_authors_notes() {
        let h = Harness::new();
        let storage = h.bridge.storage.as_ref();
        let alice = keys(1);
        let mallory = keys(2);
        let target = note(&alice, 1_700_000_000, "soon gone");
        handle_client_message(storage, &event_frame(&target)).await;
        settle().await;

        let forged = EventBuilder::new(kind::DELETION, 1_700_000_100, "")
            .tag(["e", target.id.as_str()])
            .sign(&mallory)
            .unwrap();
        handle_client_message(storage, &event_frame(&forged)).await;
        let by_id = json!(["REQ", "q", {"ids": [target.id]}]).to_string();
        assert_eq!(handle_client_message(storage, &by_id).await.len(), 2);

        let genuine = EventBuilder::new(kind::DELETION, 1_700_000_200, "")
            .tag(["e", target.id.as_str()])
            .sign(&alice)
            .unwrap();
        handle_client_message(storage, &event_frame(&genuine)).await;
        let replies = handle_client_message(storage, &by_id).await;
        assert!(matches!(replies.as_slice(), [RelayMessage::Eose(_)]));
    }

    #[tokio::test]
    async fn events_matching_several_filters_are_sent_once() {
        let h = Harness::new();
        let storage = h.bridge.storage.as_ref();
        let alice = keys(1);
        let event = note(&alice, 1_700_000_000, "once");
        handle_client_message(storage, &event_frame(&event)).await;
        settle().await;

        let req = json!(["REQ", "dup", {"ids": [event.id]}, {"authors": [alice.public_hex()]}])
            .to_string();
        let replies = handle_client_message(storage, &req).await;
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn close_is_silent() {
        let h = Harness::new();
        let replies =
            handle_client_message(h.bridge.storage.as_ref(), r#"["CLOSE","sub"]"#).await;
        assert!(replies.is_empty());
    }
}
