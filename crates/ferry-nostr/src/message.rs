//! NIP-01 wire messages.
//!
//! ```text
//! client → relay   ["EVENT", <event>]  ["REQ", <sub>, <filter>...]  ["CLOSE", <sub>]
//! relay → client   ["EVENT", <sub>, <event>]  ["EOSE", <sub>]  ["OK", <id>, <bool>, <msg>]
//!                  ["CLOSED", <sub>, <msg>]  ["NOTICE", <msg>]
//! ```

use serde_json::{Value, json};

use crate::{error::NostrError, event::Event, filter::Filter};

// ─── Client → relay ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ClientMessage {
    Event(Box<Event>),
    Req { subscription_id: String, filters: Vec<Filter> },
    Close(String),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, NostrError> {
        let value: Value = serde_json::from_str(text)?;
        let items = value
            .as_array()
            .ok_or_else(|| NostrError::MalformedMessage("message must be an array".into()))?;
        let verb = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| NostrError::MalformedMessage("missing message type".into()))?;

        match verb {
            "EVENT" => {
                let event = items
                    .get(1)
                    .ok_or_else(|| NostrError::MalformedMessage("EVENT without event".into()))?;
                Ok(Self::Event(Box::new(serde_json::from_value(event.clone())?)))
            }
            "REQ" => {
                let subscription_id = subscription_id(items)?;
                let filters = items[2..]
                    .iter()
                    .map(Filter::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Req { subscription_id, filters })
            }
            "CLOSE" => Ok(Self::Close(subscription_id(items)?)),
            other => Err(NostrError::MalformedMessage(format!("unsupported message type '{other}'"))),
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            Self::Event(event) => json!(["EVENT", event]).to_string(),
            Self::Req { subscription_id, filters } => {
                let mut items = vec![json!("REQ"), json!(subscription_id)];
                items.extend(filters.iter().map(Filter::to_value));
                Value::Array(items).to_string()
            }
            Self::Close(subscription_id) => json!(["CLOSE", subscription_id]).to_string(),
        }
    }
}

// ─── Relay → client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum RelayMessage {
    Event { subscription_id: String, event: Box<Event> },
    Eose(String),
    Ok { event_id: String, accepted: bool, message: String },
    Closed { subscription_id: String, message: String },
    Notice(String),
}

impl RelayMessage {
    pub fn parse(text: &str) -> Result<Self, NostrError> {
        let value: Value = serde_json::from_str(text)?;
        let items = value
            .as_array()
            .ok_or_else(|| NostrError::MalformedMessage("message must be an array".into()))?;
        let verb = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| NostrError::MalformedMessage("missing message type".into()))?;
        let text_at = |i: usize| items.get(i).and_then(Value::as_str).unwrap_or_default().to_owned();

        match verb {
            "EVENT" => {
                let event = items
                    .get(2)
                    .ok_or_else(|| NostrError::MalformedMessage("EVENT without event".into()))?;
                Ok(Self::Event {
                    subscription_id: text_at(1),
                    event: Box::new(serde_json::from_value(event.clone())?),
                })
            }
            "EOSE" => Ok(Self::Eose(text_at(1))),
            "OK" => Ok(Self::Ok {
                event_id: text_at(1),
                accepted: items.get(2).and_then(Value::as_bool).unwrap_or(false),
                message: text_at(3),
            }),
            "CLOSED" => Ok(Self::Closed { subscription_id: text_at(1), message: text_at(2) }),
            "NOTICE" => Ok(Self::Notice(text_at(1))),
            other => Err(NostrError::MalformedMessage(format!("unsupported message type '{other}'"))),
        }
    }

    pub fn to_json(&self) -> String {
        match self {
            Self::Event { subscription_id, event } => {
                json!(["EVENT", subscription_id, event]).to_string()
            }
            Self::Eose(subscription_id) => json!(["EOSE", subscription_id]).to_string(),
            Self::Ok { event_id, accepted, message } => {
                json!(["OK", event_id, accepted, message]).to_string()
            }
            Self::Closed { subscription_id, message } => {
                json!(["CLOSED", subscription_id, message]).to_string()
            }
            Self::Notice(message) => json!(["NOTICE", message]).to_string(),
        }
    }
}

fn subscription_id(items: &[Value]) -> Result<String, NostrError> {
    items
        .get(1)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| NostrError::MalformedMessage("missing subscription id".into()))
}
