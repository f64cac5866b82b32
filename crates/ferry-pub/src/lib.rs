//! # ferry-pub
//!
//! The ActivityPub side of the bridge.
//!
//! ## Key concepts
//!
//! - **Object model** (`types.rs`): the ActivityStreams documents the bridge
//!   reads and produces (Person, Note, collections, Create/Accept, WebFinger).
//! - **Inbound activities** (`activity.rs`): a closed enum of what the inbox
//!   understands; everything else is `Unknown`.
//! - **Server key** (`keys.rs`): one Ed25519 key pair signs every outbound
//!   delivery. Every bridged actor advertises it as `{actor}#main-key`.
//! - **HTTP signatures** (`signatures.rs`): draft-cavage signatures over
//!   `(request-target) host date digest`.
//! - **Client** (`client.rs`): fetches remote actors, notes and collections,
//!   and posts signed activities to inboxes.

pub mod activity;
pub mod client;
pub mod error;
pub mod keys;
pub mod signatures;
pub mod types;

pub use activity::InboundActivity;
pub use client::{Delivery, HttpPubClient, PubClient};
pub use error::PubError;
pub use keys::ServerKeyPair;
pub use types::{Actor, Note, RemoteCollection};
