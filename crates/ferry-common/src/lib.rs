//! # ferry-common
//!
//! Configuration and the HTTP-facing error type shared by every Ferry crate.
//! No bridge logic lives here.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{FerryError, FerryResult};
