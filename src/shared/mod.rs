//! Types shared across the crate: entity records, configuration, errors,
//! and the JSON field-map helpers the sync core is built on.

pub mod config;
pub mod error;
pub mod json;
pub mod models;

pub use error::{LocalStoreError, RemoteError, SyncError};
