//! Deterministic pseudonymous identities for ActivityPub actors.
//!
//! The Nostr secret key of a bridged actor is `HMAC-SHA256(secret, actor_url)`.
//! The forward direction needs nothing but the secret; the reverse direction
//! (pubkey → actor URL) only exists once the mapping has been recorded.

use std::sync::Arc;

use ferry_db::{BridgeStore, IdentityRecord};
use ferry_nostr::Keys;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error};

use crate::error::BridgeError;

type HmacSha256 = Hmac<Sha256>;

pub struct IdentityMapper {
    secret: Vec<u8>,
    store: Arc<dyn BridgeStore>,
}

impl IdentityMapper {
    pub fn new(secret: Vec<u8>, store: Arc<dyn BridgeStore>) -> Self {
        Self { secret, store }
    }

    /// Keys for `actor_url`. Pure: the same secret and URL always give the
    /// same keys.
    ///
    /// An HMAC output that is zero or above the curve order is re-hashed with
    /// a big-endian counter appended until it is a valid scalar.
    pub fn derive_keypair(&self, actor_url: &str) -> Keys {
        let mut counter: u32 = 0;
        loop {
            let mut mac = HmacSha256::new_from_slice(&self.secret)
                .expect("HMAC accepts keys of any length");
            mac.update(actor_url.as_bytes());
            if counter > 0 {
                mac.update(&counter.to_be_bytes());
            }
            let digest = mac.finalize().into_bytes();
            if let Ok(keys) = Keys::from_secret_bytes(&digest) {
                return keys;
            }
            counter += 1;
        }
    }

    /// Persist the mapping, insert-if-absent.
    ///
    /// The pubkey is a function of the URL, so a row binding the same pubkey
    /// to another URL means the store is corrupt.
    pub async fn record_mapping(&self, actor_url: &str, keys: &Keys) -> Result<(), BridgeError> {
        let record = IdentityRecord {
            pubkey: keys.public_hex(),
            actor_url: actor_url.to_owned(),
            privkey: keys.secret_hex(),
        };
        let on_file = self.store.insert_identity(&record).await?;
        if on_file != actor_url {
            error!(
                "Identity mapping conflict: {} is bound to {} but derives from {}",
                record.pubkey, on_file, actor_url
            );
            debug_assert!(false, "identity mapping conflict for {}", record.pubkey);
            return Err(BridgeError::Persistence(ferry_db::StoreError::Integrity(format!(
                "pubkey {} already mapped to {on_file}",
                record.pubkey
            ))));
        }
        Ok(())
    }

    /// Actor URL a bridged pubkey was derived from. Store failures read as a
    /// miss.
    pub async fn resolve_actor_url(&self, pubkey: &str) -> Option<String> {
        match self.store.actor_url_for(pubkey).await {
            Ok(found) => found,
            Err(e) => {
                error!("Identity lookup for {} failed: {}", pubkey, e);
                None
            }
        }
    }

    /// Derive and record. Recording failures are logged; the keys are always
    /// returned.
    pub async fn identity_for(&self, actor_url: &str) -> Keys {
        let keys = self.derive_keypair(actor_url);
        match self.record_mapping(actor_url, &keys).await {
            Ok(()) => debug!("Identity {} ↔ {}", keys.public_hex(), actor_url),
            Err(e) => error!("Failed to record identity for {}: {}", actor_url, e),
        }
        keys
    }
}
