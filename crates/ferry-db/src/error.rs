//! Persistence error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write would contradict data already on file.
    #[error("Integrity violation: {0}")]
    Integrity(String),
}
