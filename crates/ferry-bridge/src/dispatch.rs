//! Outbound deliveries: `Accept` replies and `Create` fan-out to followers.
//!
//! Delivery is best-effort. A follower whose actor cannot be fetched or whose
//! inbox refuses the POST is logged and skipped; nothing is retried.

use std::sync::Arc;

use ferry_db::BridgeStore;
use ferry_nostr::Event;
use ferry_pub::{Delivery, PubClient, types::Activity};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{error::BridgeError, settings::BridgeSettings, translate::Translator};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
}

pub struct Dispatcher {
    settings: Arc<BridgeSettings>,
    store: Arc<dyn BridgeStore>,
    translator: Arc<Translator>,
    client: Arc<dyn PubClient>,
    delivery: Arc<dyn Delivery>,
}

impl Dispatcher {
    pub fn new(
        settings: Arc<BridgeSettings>,
        store: Arc<dyn BridgeStore>,
        translator: Arc<Translator>,
        client: Arc<dyn PubClient>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self { settings, store, translator, client, delivery }
    }

    /// Answer a Follow of local actor `target` with an `Accept`, signed under
    /// `target`'s key id.
    pub async fn send_accept(
        &self,
        target: &str,
        follow: &Value,
        follow_id: Option<&str>,
        inbox: &str,
    ) -> Result<(), BridgeError> {
        let accept = Activity::accept(
            self.settings.accept_url(target, follow_id.unwrap_or("follow")),
            self.settings.actor_url(target),
            follow.clone(),
        );
        let body = serde_json::to_value(&accept).map_err(|e| BridgeError::Internal(e.into()))?;
        self.delivery
            .deliver(&self.settings.key_id(target), inbox, &body)
            .await
            .map_err(|e| BridgeError::Delivery(e.to_string()))?;
        debug!("Accepted follow of {} via {}", target, inbox);
        Ok(())
    }

    /// Deliver a `Create` for a kind-1 event to every follower of its author.
    pub async fn dispatch_create(&self, event: &Event) -> DeliveryReport {
        let followers = match self.store.followers_of(&event.pubkey).await {
            Ok(followers) => followers,
            Err(e) => {
                error!("Could not list followers of {}: {}", event.pubkey, e);
                return DeliveryReport::default();
            }
        };
        if followers.is_empty() {
            debug!("No followers to notify for {}", event.id);
            return DeliveryReport::default();
        }

        let mut note = self.translator.note_from_event(event).await;
        note.cc.push(self.settings.followers_url(&event.pubkey));
        let create = match Activity::create(self.settings.create_url(&event.id), &note)
            .and_then(|activity| serde_json::to_value(&activity))
        {
            Ok(create) => create,
            Err(e) => {
                error!("Could not serialise Create for {}: {}", event.id, e);
                return DeliveryReport::default();
            }
        };

        let key_id = self.settings.key_id(&event.pubkey);
        let mut report = DeliveryReport::default();
        for follower in &followers {
            report.attempted += 1;
            let inbox = match self.client.fetch_actor(follower).await {
                Ok(actor) => match actor.inbox {
                    Some(inbox) => inbox,
                    None => {
                        warn!("Follower {} advertises no inbox", follower);
                        continue;
                    }
                },
                Err(e) => {
                    warn!("Could not fetch follower {}: {}", follower, e);
                    continue;
                }
            };
            match self.delivery.deliver(&key_id, &inbox, &create).await {
                Ok(()) => report.delivered += 1,
                Err(e) => warn!("Delivery of {} to {} failed: {}", event.id, inbox, e),
            }
        }

        info!(
            "Delivered {} to {}/{} followers",
            event.id, report.delivered, report.attempted
        );
        report
    }

    /// Run [`Dispatcher::dispatch_create`] on a detached task.
    pub fn spawn_create(self: &Arc<Self>, event: Event) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.dispatch_create(&event).await;
        });
    }
}
