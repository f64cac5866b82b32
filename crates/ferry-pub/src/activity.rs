//! Activities accepted by the inbox.

use serde_json::Value;

use crate::{
    error::PubError,
    types::{Note, id_ref},
};

/// What the inbox understands. Anything else is `Unknown` and only logged.
#[derive(Debug, Clone)]
pub enum InboundActivity {
    /// `actor` wants to follow the local actor `object`.
    Follow { id: Option<String>, actor: String, object: String, raw: Value },
    /// `actor` stops following `object`.
    UndoFollow { actor: String, object: String },
    /// `actor` was deleted; all of its follows go away.
    Delete { actor: String },
    /// A bare Note, or a Create wrapping one.
    Note(Box<Note>),
    Unknown { kind: String },
}

impl InboundActivity {
    pub fn parse(body: &Value) -> Result<Self, PubError> {
        let kind = str_field(body, "type").unwrap_or_default();

        match kind.as_str() {
            "Follow" => Ok(Self::Follow {
                id: str_field(body, "id"),
                actor: required(body, "actor")?,
                object: required(body, "object")?,
                raw: body.clone(),
            }),
            "Undo" => {
                let inner = body
                    .get("object")
                    .ok_or_else(|| PubError::MalformedActivity("Undo without object".into()))?;
                if str_field(inner, "type").as_deref() != Some("Follow") {
                    return Ok(Self::Unknown { kind: "Undo".into() });
                }
                Ok(Self::UndoFollow {
                    // Fall back to the outer actor when the inner Follow omits it.
                    actor: str_field(inner, "actor")
                        .map_or_else(|| required(body, "actor"), Ok)?,
                    object: required(inner, "object")?,
                })
            }
            "Delete" => Ok(Self::Delete { actor: required(body, "actor")? }),
            "Note" => Ok(Self::Note(Box::new(serde_json::from_value(body.clone())?))),
            "Create" => match body.get("object") {
                Some(object) if str_field(object, "type").as_deref() == Some("Note") => {
                    Ok(Self::Note(Box::new(serde_json::from_value(object.clone())?)))
                }
                _ => Ok(Self::Unknown { kind: kind.clone() }),
            },
            _ => Ok(Self::Unknown { kind: kind.clone() }),
        }
    }
}

/// Last path segment of a local actor URL: the Nostr pubkey it stands for.
pub fn local_target(object_url: &str) -> &str {
    object_url.trim_end_matches('/').rsplit('/').next().unwrap_or(object_url)
}

fn str_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(id_ref)
}

fn required(value: &Value, name: &str) -> Result<String, PubError> {
    str_field(value, name)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PubError::MalformedActivity(format!("missing '{name}'")))
}
