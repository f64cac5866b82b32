//! # ferry-bridge
//!
//! The protocol bridge engine: deterministic identity mapping, the event
//! cache, object translation, the relay storage adapter, collection
//! pagination, the shared inbox and outbound delivery.
//!
//! Everything is wired together by [`Bridge::new`].

pub mod adapter;
pub mod cache;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod inbox;
pub mod keys;
pub mod pagination;
pub mod service;
pub mod settings;
pub mod translate;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{BridgeStorage, RelayStorage};
pub use cache::{CacheKey, CacheOutcome, EventCache};
pub use error::BridgeError;
pub use identity::IdentityMapper;
pub use inbox::InboxOutcome;
pub use keys::KeyManager;
pub use service::{Bridge, BridgeDeps};
pub use settings::BridgeSettings;
pub use translate::Translator;
