//! Pollen Catalog: local-first specimen catalog storage
//!
//! A versioned embedded object store for catalog records and image blobs, a
//! tiered image read path with a secondary fallback cache, and an in-memory
//! catalog manager that persists every mutation in the background.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod images;
pub mod logging;
pub mod session;
pub mod store;
pub mod types;

pub use catalog::{CatalogManager, NewRecord, Record, RecordPatch, StorageMode};
pub use error::ApiError;
pub use session::CatalogSession;
