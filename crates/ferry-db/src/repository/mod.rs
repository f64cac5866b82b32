//! Repository layer: query functions organized by table.

pub mod cache;
pub mod followers;
pub mod identity;
pub mod notes;
pub mod server_keys;
pub mod shadows;
