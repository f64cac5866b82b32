//! One-shot queries against a single remote relay.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    error::NostrError,
    event::Event,
    filter::Filter,
    message::{ClientMessage, RelayMessage},
};

/// Fetches the stored events matching one filter from one relay.
///
/// Implementations return once the relay signals end of stored events. Timeouts
/// are applied by the caller.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn query(&self, relay_url: &str, filter: &Filter) -> Result<Vec<Event>, NostrError>;
}

/// WebSocket connector speaking NIP-01.
#[derive(Debug, Clone, Default)]
pub struct WsRelayConnector;

impl WsRelayConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayConnector for WsRelayConnector {
    async fn query(&self, relay_url: &str, filter: &Filter) -> Result<Vec<Event>, NostrError> {
        let (mut ws, _) = connect_async(relay_url)
            .await
            .map_err(|e| NostrError::Connect(relay_url.to_owned(), e.to_string()))?;
        let transport = |e: tokio_tungstenite::tungstenite::Error| {
            NostrError::Transport(relay_url.to_owned(), e.to_string())
        };

        let subscription_id = format!("ferry-{}", uuid::Uuid::new_v4().simple());
        let req = ClientMessage::Req {
            subscription_id: subscription_id.clone(),
            filters: vec![filter.clone()],
        };
        ws.send(Message::Text(req.to_json().into())).await.map_err(transport)?;

        let mut events = Vec::new();
        while let Some(frame) = ws.next().await {
            let text = match frame.map_err(transport)? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match RelayMessage::parse(text.as_str()) {
                Ok(RelayMessage::Event { subscription_id: sub, event }) if sub == subscription_id => {
                    events.push(*event);
                }
                Ok(RelayMessage::Eose(sub)) if sub == subscription_id => break,
                Ok(RelayMessage::Closed { subscription_id: sub, message }) if sub == subscription_id => {
                    tracing::debug!(relay = relay_url, %message, "Subscription closed by relay");
                    break;
                }
                Ok(RelayMessage::Notice(message)) => {
                    tracing::debug!(relay = relay_url, %message, "Relay notice");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(relay = relay_url, error = %e, "Ignoring unparseable frame"),
            }
        }

        // Best effort: the relay may already have hung up.
        let _ = ws.send(Message::Text(ClientMessage::Close(subscription_id).to_json().into())).await;
        let _ = ws.close(None).await;

        Ok(events)
    }
}
