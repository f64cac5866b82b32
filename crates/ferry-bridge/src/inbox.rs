//! Shared inbox: the activities remote ActivityPub servers send us.
//!
//! | Activity             | Effect                                         |
//! |----------------------|------------------------------------------------|
//! | `Follow`             | follower edge + signed `Accept` to the follower |
//! | `Undo { Follow }`    | edge removed                                   |
//! | `Delete`             | every edge of the deleted actor removed        |
//! | `Note` / `Create`    | translated into a kind-1 event and cached      |
//! | anything else        | logged, acknowledged                           |

use std::sync::Arc;

use ferry_db::BridgeStore;
use ferry_nostr::keys::is_hex32;
use ferry_pub::{InboundActivity, PubClient, activity::local_target};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    dispatch::Dispatcher, error::BridgeError, identity::IdentityMapper, translate::Translator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxOutcome {
    Followed { pubkey: String },
    Unfollowed { pubkey: String },
    ActorDeleted { edges_removed: u64 },
    NoteStored { event_id: String },
    Ignored { kind: String },
}

pub struct InboxHandler {
    store: Arc<dyn BridgeStore>,
    identity: Arc<IdentityMapper>,
    translator: Arc<Translator>,
    dispatcher: Arc<Dispatcher>,
    client: Arc<dyn PubClient>,
}

impl InboxHandler {
    pub fn new(
        store: Arc<dyn BridgeStore>,
        identity: Arc<IdentityMapper>,
        translator: Arc<Translator>,
        dispatcher: Arc<Dispatcher>,
        client: Arc<dyn PubClient>,
    ) -> Self {
        Self { store, identity, translator, dispatcher, client }
    }

    pub async fn handle(&self, body: &Value) -> Result<InboxOutcome, BridgeError> {
        let activity = InboundActivity::parse(body)
            .map_err(|e| BridgeError::validation(format!("unreadable activity: {e}")))?;

        match activity {
            InboundActivity::Follow { id, actor, object, raw } => {
                let target = local_target(&object);
                if !is_hex32(target) {
                    return Err(BridgeError::not_found(format!("actor {object}")));
                }
                self.identity.identity_for(&actor).await;
                self.store.add_follower(target, &actor).await?;

                let inbox = match self.client.fetch_actor(&actor).await {
                    Ok(follower) => follower.inbox,
                    Err(e) => {
                        return Err(BridgeError::validation(format!(
                            "could not fetch follower {actor}: {e}"
                        )));
                    }
                };
                let inbox = inbox.ok_or_else(|| {
                    BridgeError::validation(format!("follower {actor} has no inbox"))
                })?;

                self.dispatcher.send_accept(target, &raw, id.as_deref(), &inbox).await?;
                info!("{} now follows {}", actor, target);
                Ok(InboxOutcome::Followed { pubkey: target.to_owned() })
            }

            InboundActivity::UndoFollow { actor, object } => {
                let target = local_target(&object);
                if self.store.remove_follower(target, &actor).await? {
                    info!("{} unfollowed {}", actor, target);
                }
                Ok(InboxOutcome::Unfollowed { pubkey: target.to_owned() })
            }

            InboundActivity::Delete { actor } => {
                let edges_removed = self.store.remove_follower_everywhere(&actor).await?;
                info!("{} was deleted; dropped {} follow edges", actor, edges_removed);
                Ok(InboxOutcome::ActorDeleted { edges_removed })
            }

            InboundActivity::Note(note) => {
                let event = self.translator.event_from_note(&note).await?;
                Ok(InboxOutcome::NoteStored { event_id: event.id })
            }

            InboundActivity::Unknown { kind } => {
                debug!("Ignoring inbound {} activity", kind);
                Ok(InboxOutcome::Ignored { kind })
            }
        }
    }
}
