//! Sled-backed object store.
//!
//! One tree per collection, one tree per secondary index, and a `meta` tree
//! holding the schema version. Sled calls run on the blocking pool.

use crate::error::StoreError;
use crate::store::entry::{index_key, index_value, primary_key, Entry};
use crate::store::schema::{
    Collection, CollectionSchema, DATABASE_VERSION, META_TREE, VERSION_KEY,
};
use crate::store::ObjectStore;
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Object store handle over a local sled database
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    path: PathBuf,
}

/// A validated row ready to be written: primary key, encoded value, index keys
struct Row {
    key: String,
    value: Vec<u8>,
    index_keys: Vec<Option<Vec<u8>>>,
}

impl SledStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let open_path = path.clone();
        let db = tokio::task::spawn_blocking(move || -> Result<Db, StoreError> {
            std::fs::create_dir_all(&open_path).map_err(|e| {
                StoreError::StoreUnavailable(format!(
                    "Failed to create database directory {}: {}",
                    open_path.display(),
                    e
                ))
            })?;
            let db = sled::open(&open_path).map_err(|e| {
                StoreError::StoreUnavailable(format!(
                    "Failed to open database {}: {}",
                    open_path.display(),
                    e
                ))
            })?;
            upgrade(&db)?;
            Ok(db)
        })
        .await
        .map_err(|e| StoreError::StoreUnavailable(format!("Open task failed: {}", e)))??;

        info!(path = %path.display(), version = DATABASE_VERSION, "Object store opened");
        Ok(Self { db, path })
    }

    /// Path of the database directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version recorded in the database
    pub fn stored_version(&self) -> Result<Option<u64>, StoreError> {
        read_version(&self.db).map_err(|e| StoreError::ReadFailed(e.to_string()))
    }

    async fn blocking<T, F>(
        &self,
        on_join_error: fn(String) -> StoreError,
        f: F,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Db) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| on_join_error(format!("Store task failed: {}", e)))?
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").field("path", &self.path).finish()
    }
}

fn read_version(db: &Db) -> Result<Option<u64>, StoreError> {
    let meta = db
        .open_tree(META_TREE)
        .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
    let raw = meta
        .get(VERSION_KEY)
        .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
    match raw {
        None => Ok(None),
        Some(bytes) => {
            let bytes: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                StoreError::StoreUnavailable("Corrupt schema version record".to_string())
            })?;
            Ok(Some(u64::from_be_bytes(bytes)))
        }
    }
}

/// Create every collection and index tree if missing, then record the version.
/// Re-running on a current schema is a no-op.
fn upgrade(db: &Db) -> Result<(), StoreError> {
    let current = read_version(db)?;
    match current {
        Some(version) if version > DATABASE_VERSION => {
            return Err(StoreError::StoreUnavailable(format!(
                "Database schema version {} is newer than supported version {}",
                version, DATABASE_VERSION
            )));
        }
        Some(version) if version == DATABASE_VERSION => {
            debug!(version, "Schema is current");
            return Ok(());
        }
        _ => {}
    }

    info!(from = ?current, to = DATABASE_VERSION, "Upgrading object store schema");
    let unavailable = |e: sled::Error| StoreError::StoreUnavailable(format!("Upgrade failed: {}", e));
    for collection in Collection::ALL {
        let schema = collection.schema();
        db.open_tree(schema.name).map_err(unavailable)?;
        for index in schema.indexes {
            db.open_tree(schema.index_tree_name(index))
                .map_err(unavailable)?;
        }
    }
    let meta = db.open_tree(META_TREE).map_err(unavailable)?;
    meta.insert(VERSION_KEY, DATABASE_VERSION.to_be_bytes().to_vec())
        .map_err(unavailable)?;
    db.flush().map_err(unavailable)?;
    Ok(())
}

/// Collection tree followed by its index trees, in schema order
fn open_trees(db: &Db, schema: &CollectionSchema) -> Result<Vec<Tree>, sled::Error> {
    let mut trees = Vec::with_capacity(schema.indexes.len() + 1);
    trees.push(db.open_tree(schema.name)?);
    for index in schema.indexes {
        trees.push(db.open_tree(schema.index_tree_name(index))?);
    }
    Ok(trees)
}

fn encode_row(schema: &CollectionSchema, entry: &Entry) -> Result<Row, StoreError> {
    let key = primary_key(schema, entry)?;
    let value = serde_json::to_vec(entry)
        .map_err(|e| StoreError::WriteFailed(format!("Failed to encode entry {}: {}", key, e)))?;
    let index_keys = schema
        .indexes
        .iter()
        .map(|index| index_value(entry, index.key_path).map(|v| index_key(&v, &key)))
        .collect();
    Ok(Row {
        key,
        value,
        index_keys,
    })
}

fn decode_value(bytes: &[u8]) -> Result<Entry, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::ReadFailed(format!("Corrupt entry: {}", e)))
}

/// Index keys of an already-stored value, used to unlink it from its indexes
fn stored_index_keys(schema: &CollectionSchema, key: &str, stored: &[u8]) -> Vec<Option<Vec<u8>>> {
    match serde_json::from_slice::<Entry>(stored) {
        Ok(old) => schema
            .indexes
            .iter()
            .map(|index| index_value(&old, index.key_path).map(|v| index_key(&v, key)))
            .collect(),
        Err(_) => vec![None; schema.indexes.len()],
    }
}

fn insert_row(trees: &[TransactionalTree], row: &Row) -> ConflictableTransactionResult<(), ()> {
    trees[0].insert(row.key.as_bytes(), row.value.as_slice())?;
    for (tree, index_key) in trees[1..].iter().zip(&row.index_keys) {
        if let Some(index_key) = index_key {
            tree.insert(index_key.as_slice(), row.key.as_bytes())?;
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for SledStore {
    async fn replace_all(&self, collection: Collection, entries: Vec<Entry>) -> Result<(), StoreError> {
        self.blocking(StoreError::WriteFailed, move |db| {
            let schema = collection.schema();
            let mut seen = HashSet::with_capacity(entries.len());
            let mut rows = Vec::with_capacity(entries.len());
            for entry in &entries {
                let row = encode_row(schema, entry)?;
                if !seen.insert(row.key.clone()) {
                    return Err(StoreError::WriteFailed(format!(
                        "Duplicate key '{}' in batch for {}",
                        row.key, collection
                    )));
                }
                rows.push(row);
            }

            let write_failed = |e: sled::Error| StoreError::WriteFailed(e.to_string());
            let trees = open_trees(&db, schema).map_err(write_failed)?;
            let mut existing = Vec::with_capacity(trees.len());
            for tree in &trees {
                let keys = tree
                    .iter()
                    .keys()
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(write_failed)?;
                existing.push(keys);
            }

            trees
                .as_slice()
                .transaction(|tx_trees| -> ConflictableTransactionResult<(), ()> {
                    for (tree, keys) in tx_trees.iter().zip(&existing) {
                        for key in keys {
                            tree.remove(key.clone())?;
                        }
                    }
                    for row in &rows {
                        insert_row(tx_trees, row)?;
                    }
                    Ok(())
                })
                .map_err(|e| StoreError::WriteFailed(format!("Transaction aborted: {:?}", e)))?;

            db.flush().map_err(write_failed)?;
            debug!(collection = %collection, count = rows.len(), "Replaced collection");
            Ok(())
        })
        .await
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<Entry>, StoreError> {
        self.blocking(StoreError::ReadFailed, move |db| {
            let tree = db
                .open_tree(collection.name())
                .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            let mut entries = Vec::with_capacity(tree.len());
            for value in tree.iter().values() {
                let value = value.map_err(|e| StoreError::ReadFailed(e.to_string()))?;
                entries.push(decode_value(&value)?);
            }
            Ok(entries)
        })
        .await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Entry>, StoreError> {
        let key = key.to_string();
        self.blocking(StoreError::ReadFailed, move |db| {
            let tree = db
                .open_tree(collection.name())
                .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            let value = tree
                .get(key.as_bytes())
                .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
            value.map(|v| decode_value(&v)).transpose()
        })
        .await
    }

    async fn put(&self, collection: Collection, entry: Entry) -> Result<(), StoreError> {
        self.blocking(StoreError::WriteFailed, move |db| {
            let schema = collection.schema();
            let row = encode_row(schema, &entry)?;
            let write_failed = |e: sled::Error| StoreError::WriteFailed(e.to_string());
            let trees = open_trees(&db, schema).map_err(write_failed)?;

            trees
                .as_slice()
                .transaction(|tx_trees| -> ConflictableTransactionResult<(), ()> {
                    if let Some(previous) = tx_trees[0].get(row.key.as_bytes())? {
                        let stale = stored_index_keys(schema, &row.key, &previous);
                        for (tree, index_key) in tx_trees[1..].iter().zip(stale) {
                            if let Some(index_key) = index_key {
                                tree.remove(index_key)?;
                            }
                        }
                    }
                    insert_row(tx_trees, &row)
                })
                .map_err(|e| StoreError::WriteFailed(format!("Transaction aborted: {:?}", e)))?;

            db.flush().map_err(write_failed)?;
            Ok(())
        })
        .await
    }

    async fn get_all_by_index(
        &self,
        collection: Collection,
        index: &str,
    ) -> Result<Vec<Entry>, StoreError> {
        let schema = collection.schema();
        let index = schema.index(index).ok_or_else(|| {
            StoreError::ReadFailed(format!("Collection {} has no index '{}'", collection, index))
        })?;
        let index_tree = schema.index_tree_name(index);
        self.blocking(StoreError::ReadFailed, move |db| {
            let read_failed = |e: sled::Error| StoreError::ReadFailed(e.to_string());
            let tree = db.open_tree(schema.name).map_err(read_failed)?;
            let index = db.open_tree(index_tree).map_err(read_failed)?;
            let mut entries = Vec::with_capacity(index.len());
            for primary in index.iter().values() {
                let primary = primary.map_err(read_failed)?;
                if let Some(value) = tree.get(&primary).map_err(read_failed)? {
                    entries.push(decode_value(&value)?);
                }
            }
            Ok(entries)
        })
        .await
    }
}
