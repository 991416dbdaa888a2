//! Object Store
//!
//! Versioned local database with two named collections: `records` (indexed by
//! `latinName` and `createdAt`) and `images`. Entries are JSON objects keyed by
//! their `id` field.

pub mod entry;
pub mod schema;
pub mod sled_store;

pub use entry::{from_entry, to_entry, Entry};
pub use schema::{Collection, CollectionSchema, IndexSchema, DATABASE_VERSION};
pub use sled_store::SledStore;

use crate::error::StoreError;
use async_trait::async_trait;

/// Object store interface
///
/// Every operation is transactional on its own; there is no isolation across calls.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Clear `collection` and insert every entry, all-or-nothing.
    async fn replace_all(&self, collection: Collection, entries: Vec<Entry>) -> Result<(), StoreError>;

    /// Every stored entry in key order; empty when the collection is empty.
    async fn get_all(&self, collection: Collection) -> Result<Vec<Entry>, StoreError>;

    /// Point lookup; `Ok(None)` when the key is absent.
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Entry>, StoreError>;

    /// Insert or overwrite by key.
    async fn put(&self, collection: Collection, entry: Entry) -> Result<(), StoreError>;

    /// Every indexed entry, ordered by the index value.
    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
    ) -> Result<Vec<Entry>, StoreError>;
}
