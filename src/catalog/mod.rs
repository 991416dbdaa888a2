//! Catalog State Manager
//!
//! The in-memory working set of records, its queries, first-run seeding and
//! background persistence into the object store's `records` collection.

pub mod manager;
pub mod persist;
pub mod query;
pub mod record;
pub mod seed;

pub use manager::{CatalogManager, StorageMode};
pub use persist::{persist, PersistQueue, PersistStats};
pub use query::SortOrder;
pub use record::{Measurement, NewRecord, Record, RecordPatch, StoredRecord, CREATED_AT_FORMAT};
pub use seed::sample_records;
