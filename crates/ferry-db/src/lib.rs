//! # ferry-db
//!
//! Persistence for Ferry. The bridge only sees the [`BridgeStore`] trait:
//! - **PostgreSQL** ([`PgStore`]): production store, schema in `migrations/`
//! - **In-memory** ([`MemoryStore`]): tests and database-less runs; state is
//!   lost on restart

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{
    ActorShadow, CacheRow, IdentityRecord, NoteMapping, NoteShadow, ServerKeyRecord,
};
pub use postgres::PgStore;
pub use store::BridgeStore;

use anyhow::Result;
use sqlx::PgPool;

/// PostgreSQL connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(url)
            .await?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pg })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    pub fn store(&self) -> PgStore {
        PgStore::new(self.pg.clone())
    }
}
