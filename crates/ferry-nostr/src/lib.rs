//! # ferry-nostr
//!
//! Nostr side of the Ferry bridge.
//!
//! ## Key concepts
//!
//! - **Events** (`event.rs`): the NIP-01 event model. An event id is the SHA-256
//!   of its canonical serialisation; the signature is a BIP-340 Schnorr
//!   signature over that id.
//! - **Keys** (`keys.rs`): secp256k1 key pairs used to sign events on behalf of
//!   bridged ActivityPub actors.
//! - **Filters** (`filter.rs`): REQ filters and local matching.
//! - **Wire messages** (`message.rs`): `EVENT` / `REQ` / `CLOSE` / `EOSE` / `OK`
//!   framing shared by the outbound client and the bridge relay endpoint.
//! - **Relay client** (`relay_client.rs`): one query against one remote relay.
//! - **Peer pool** (`pool.rs`): fan-out over the known relays with a rotating
//!   cursor, per-attempt timeouts and id de-duplication.

pub mod error;
pub mod event;
pub mod filter;
pub mod keys;
pub mod message;
pub mod pool;
pub mod relay_client;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::NostrError;
pub use event::{Event, EventBuilder, kind};
pub use filter::Filter;
pub use keys::Keys;
pub use pool::{PeerPool, PeerPoolConfig};
pub use relay_client::{RelayConnector, WsRelayConnector};
