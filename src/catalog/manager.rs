//! Catalog state manager.
//!
//! Holds the in-memory working set, which is authoritative for the session,
//! and delegates durability to the background persistence queue.

use crate::catalog::persist::{self, PersistQueue, PersistStats};
use crate::catalog::query::{self, SortOrder};
use crate::catalog::record::{NewRecord, Record, RecordPatch, StoredRecord};
use crate::catalog::seed::sample_records;
use crate::codec::{self, ImageFetcher};
use crate::config::SeedConfig;
use crate::error::StoreError;
use crate::ids::IdGenerator;
use crate::images::ImageRepository;
use crate::store::{from_entry, Collection, ObjectStore};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Whether mutations reach the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Store loaded; every mutation is written in the background
    Persistent,
    /// Store missing or unreadable; the working set lives in memory only
    Degraded,
}

/// In-memory authoritative record list with automatic persistence
pub struct CatalogManager {
    store: Option<Arc<dyn ObjectStore>>,
    images: Arc<ImageRepository>,
    fetcher: Arc<dyn ImageFetcher>,
    seed: SeedConfig,
    records: RwLock<Vec<Record>>,
    ids: IdGenerator,
    loading: watch::Sender<bool>,
    started: AtomicBool,
    persister: OnceLock<PersistQueue>,
    mode: RwLock<StorageMode>,
}

impl CatalogManager {
    /// `store` is None when the object store could not be opened.
    pub fn new(
        store: Option<Arc<dyn ObjectStore>>,
        images: Arc<ImageRepository>,
        fetcher: Arc<dyn ImageFetcher>,
        seed: SeedConfig,
    ) -> Self {
        let (loading, _) = watch::channel(true);
        Self {
            store,
            images,
            fetcher,
            seed,
            records: RwLock::new(Vec::new()),
            ids: IdGenerator::new(),
            loading,
            started: AtomicBool::new(false),
            persister: OnceLock::new(),
            mode: RwLock::new(StorageMode::Degraded),
        }
    }

    /// Load the working set. Never fails: a missing or unreadable store
    /// leaves the sample records in memory.
    ///
    /// Only the first call does any work; later calls wait for it to settle.
    pub async fn initialize(&self) -> StorageMode {
        if self.started.swap(true, Ordering::SeqCst) {
            self.wait_until_loaded().await;
            return self.storage_mode();
        }

        let mode = match self.store.clone() {
            None => {
                warn!("Object store unavailable; using sample records in memory");
                self.adopt(sample_records());
                StorageMode::Degraded
            }
            Some(store) => match load(store.as_ref()).await {
                Ok(records) if !records.is_empty() => {
                    info!(count = records.len(), "Loaded records from object store");
                    self.adopt(records);
                    self.start_persister(store);
                    StorageMode::Persistent
                }
                Ok(_) => {
                    info!("Object store is empty; seeding sample records");
                    let seeded = self.prepare_seed().await;
                    if let Err(e) = persist::persist(store.as_ref(), &seeded).await {
                        warn!(error = %e, "Failed to persist seeded records");
                    }
                    self.adopt(seeded);
                    self.start_persister(store);
                    StorageMode::Persistent
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load records; using sample records in memory");
                    self.adopt(sample_records());
                    StorageMode::Degraded
                }
            },
        };

        *self.mode.write() = mode;
        self.loading.send_replace(false);
        mode
    }

    fn adopt(&self, records: Vec<Record>) {
        for record in &records {
            self.ids.observe(&record.id);
        }
        *self.records.write() = records;
    }

    fn start_persister(&self, store: Arc<dyn ObjectStore>) {
        if self.persister.set(PersistQueue::spawn(store)).is_err() {
            debug!("Persistence task already running");
        }
    }

    /// Sample records with their remote images converted into stored blobs.
    /// A URL that cannot be converted stays in place.
    async fn prepare_seed(&self) -> Vec<Record> {
        let records = sample_records();
        if !self.seed.convert_images {
            return records;
        }
        futures::future::join_all(records.into_iter().map(|record| self.convert_images(record)))
            .await
    }

    async fn convert_images(&self, mut record: Record) -> Record {
        let mut images = Vec::with_capacity(record.images.len());
        for image in record.images {
            if !is_remote(&image) {
                images.push(image);
                continue;
            }
            match self.images.save_from_url(self.fetcher.as_ref(), &image).await {
                Ok(key) => {
                    debug!(url = %image, key = %key, "Converted seed image");
                    images.push(key);
                }
                Err(e) => {
                    warn!(url = %image, error = %e, "Seed image conversion failed; keeping URL");
                    images.push(image);
                }
            }
        }
        record.images = images;
        record
    }

    /// True until `initialize` settles; never reverts.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub async fn wait_until_loaded(&self) {
        let mut receiver = self.loading.subscribe();
        loop {
            if !*receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn storage_mode(&self) -> StorageMode {
        *self.mode.read()
    }

    /// Queue `records` for writing. Called with the write guard held so
    /// snapshots reach the queue in the order they were taken.
    fn schedule(&self, records: &[Record]) {
        match self.persister.get() {
            Some(persister) => persister.schedule(records.to_vec()),
            None => debug!("Storage degraded; change kept in memory only"),
        }
    }

    /// Add a record with a fresh identity and the current time.
    pub fn create(&self, fields: NewRecord) -> Record {
        let record = Record::new(self.ids.next_id(), Utc::now(), fields);
        {
            let mut records = self.records.write();
            records.push(record.clone());
            self.schedule(&records);
        }
        info!(id = %record.id, latin_name = %record.latin_name, "Record added");
        record
    }

    /// Merge `patch` into the record with `id`. Returns the record as it now
    /// stands, or None when no record has that id.
    pub fn update(&self, id: &str, patch: RecordPatch) -> Option<Record> {
        let (updated, changed) = {
            let mut records = self.records.write();
            let record = records.iter_mut().find(|r| r.id == id)?;
            let changed = record.apply(patch);
            let updated = record.clone();
            if changed {
                self.schedule(&records);
            }
            (updated, changed)
        };
        if changed {
            info!(id, "Record updated");
        } else {
            debug!(id, "Update left record unchanged");
        }
        Some(updated)
    }

    /// Remove the record with `id`; referenced images are left in place.
    pub fn delete(&self, id: &str) -> Option<Record> {
        let removed = {
            let mut records = self.records.write();
            let position = records.iter().position(|r| r.id == id)?;
            let removed = records.remove(position);
            self.schedule(&records);
            removed
        };
        info!(id, "Record deleted");
        Some(removed)
    }

    pub fn find(&self, id: &str) -> Option<Record> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot of the working set
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn filter(&self, query: &str) -> Vec<Record> {
        query::filter(&self.records.read(), query)
    }

    pub fn featured(&self) -> Vec<Record> {
        query::featured(&self.records.read())
    }

    pub fn recent(&self, limit: usize) -> Vec<Record> {
        query::recent(&self.records.read(), limit)
    }

    pub fn families(&self) -> Vec<String> {
        query::families(&self.records.read())
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<Record> {
        let mut records = self.records();
        query::sort(&mut records, order);
        records
    }

    /// Wait for queued writes. Returns at once in degraded mode.
    pub async fn flush(&self) {
        if let Some(persister) = self.persister.get() {
            persister.flush().await;
        }
    }

    pub fn persist_stats(&self) -> Option<PersistStats> {
        self.persister.get().map(PersistQueue::stats)
    }

    pub fn images(&self) -> &Arc<ImageRepository> {
        &self.images
    }
}

impl std::fmt::Debug for CatalogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogManager")
            .field("records", &self.records.read().len())
            .field("mode", &self.storage_mode())
            .field("loading", &self.is_loading())
            .finish()
    }
}

/// Remote images worth converting; data URIs are already self-contained.
fn is_remote(image: &str) -> bool {
    codec::is_url(image)
        && (image.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("http://"))
            || image.get(..8).is_some_and(|p| p.eq_ignore_ascii_case("https://")))
}

async fn load(store: &dyn ObjectStore) -> Result<Vec<Record>, StoreError> {
    store
        .get_all(Collection::Records)
        .await?
        .into_iter()
        .map(|entry| Record::try_from(from_entry::<StoredRecord>(entry)?))
        .collect()
}
