//! Store-backed server signing key management.
//!
//! On startup, [`KeyManager::load_or_generate`] asks the store for the active
//! key. If there is none (first run), it generates a fresh Ed25519 pair,
//! persists it, and returns it.
//!
//! Keys do not expire: the seed is also the default identity derivation
//! secret, and rotating it would give every bridged actor a new pubkey.

use std::sync::Arc;

use ferry_db::{BridgeStore, ServerKeyRecord};
use ferry_pub::ServerKeyPair;
use tracing::{info, warn};

use crate::error::BridgeError;

pub struct KeyManager {
    store: Arc<dyn BridgeStore>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn BridgeStore>) -> Self {
        Self { store }
    }

    /// Return the active `ServerKeyPair`, generating and persisting one if
    /// the store has none.
    pub async fn load_or_generate(&self) -> Result<Arc<ServerKeyPair>, BridgeError> {
        if let Some(record) = self.store.active_server_key().await? {
            let kp = ServerKeyPair::from_seed(&record.seed_bytes)?;
            info!("Loaded active signing key {}", record.key_id);
            return Ok(Arc::new(kp));
        }

        warn!("No active signing key, generating a new Ed25519 key pair");

        let kp = ServerKeyPair::generate();
        self.store
            .insert_server_key(&ServerKeyRecord {
                key_id: kp.key_id.clone(),
                seed_bytes: kp.seed_bytes().to_vec(),
                public_key_b64: kp.public_key_base64(),
            })
            .await?;

        info!("Generated and persisted new signing key {}", kp.key_id);
        Ok(Arc::new(kp))
    }
}
