//! Catalog session: the surface consumed by presentation code.
//!
//! Wires configuration into the object store, fallback cache, image
//! repository and catalog manager. Opening never fails because of the object
//! store; a store that cannot be opened leaves the session in degraded mode.

use crate::catalog::{CatalogManager, NewRecord, Record, RecordPatch, SortOrder, StorageMode};
use crate::codec::{HttpFetcher, ImageFetcher};
use crate::config::CatalogConfig;
use crate::error::{ApiError, ImageError};
use crate::images::{FallbackCache, FileFallbackCache, ImageLookup, ImageRepository};
use crate::store::{ObjectStore, SledStore};
use crate::types::{EncodedImage, ImageKey};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CatalogSession {
    catalog: Arc<CatalogManager>,
    images: Arc<ImageRepository>,
}

impl CatalogSession {
    /// Open storage from configuration and load the catalog.
    pub async fn open(config: &CatalogConfig) -> Result<Self, ApiError> {
        Self::open_with_fetcher(config, Arc::new(HttpFetcher::new())).await
    }

    /// Like `open`, with a custom fetcher for seed image conversion.
    pub async fn open_with_fetcher(
        config: &CatalogConfig,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Result<Self, ApiError> {
        let database_path = config.storage.database_path()?;
        let store: Option<Arc<dyn ObjectStore>> = match SledStore::open(&database_path).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(path = %database_path.display(), error = %e, "Object store unavailable");
                None
            }
        };
        let fallback: Arc<dyn FallbackCache> = Arc::new(FileFallbackCache::new(
            config.storage.fallback_cache_path()?,
            config.images.fallback_capacity_bytes,
        ));

        let session = Self::from_parts(store, fallback, fetcher, config);
        let mode = session.catalog.initialize().await;
        info!(mode = ?mode, records = session.catalog.len(), "Catalog session ready");
        Ok(session)
    }

    /// Assemble a session from already-built parts. The catalog is not loaded
    /// yet; call `start` or `initialize`.
    pub fn from_parts(
        store: Option<Arc<dyn ObjectStore>>,
        fallback: Arc<dyn FallbackCache>,
        fetcher: Arc<dyn ImageFetcher>,
        config: &CatalogConfig,
    ) -> Self {
        let images = Arc::new(ImageRepository::new(store.clone(), fallback, &config.images));
        let catalog = Arc::new(CatalogManager::new(
            store,
            Arc::clone(&images),
            fetcher,
            config.seed.clone(),
        ));
        Self { catalog, images }
    }

    /// Load the catalog in the background; watch `is_loading` for completion.
    pub fn start(&self) -> tokio::task::JoinHandle<StorageMode> {
        let catalog = Arc::clone(&self.catalog);
        tokio::spawn(async move { catalog.initialize().await })
    }

    pub async fn initialize(&self) -> StorageMode {
        self.catalog.initialize().await
    }

    pub fn catalog(&self) -> &Arc<CatalogManager> {
        &self.catalog
    }

    pub fn is_loading(&self) -> bool {
        self.catalog.is_loading()
    }

    pub async fn wait_until_loaded(&self) {
        self.catalog.wait_until_loaded().await
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.catalog.storage_mode()
    }

    pub fn records(&self) -> Vec<Record> {
        self.catalog.records()
    }

    pub fn filtered(&self, query: &str) -> Vec<Record> {
        self.catalog.filter(query)
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<Record> {
        self.catalog.sorted(order)
    }

    pub fn find(&self, id: &str) -> Option<Record> {
        self.catalog.find(id)
    }

    pub fn create(&self, fields: NewRecord) -> Record {
        self.catalog.create(fields)
    }

    pub fn update(&self, id: &str, patch: RecordPatch) -> Option<Record> {
        self.catalog.update(id, patch)
    }

    pub fn delete(&self, id: &str) -> Option<Record> {
        self.catalog.delete(id)
    }

    pub async fn save_image(
        &self,
        data: EncodedImage,
        key: Option<&str>,
    ) -> Result<ImageKey, ImageError> {
        self.images.save_image(data, key).await
    }

    pub async fn save_upload(&self, path: &Path) -> Result<ImageKey, ImageError> {
        self.images.save_upload(path).await
    }

    pub async fn get_image(&self, key: &str) -> ImageLookup {
        self.images.get_image(key).await
    }

    pub async fn flush(&self) {
        self.catalog.flush().await
    }
}

impl std::fmt::Debug for CatalogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSession")
            .field("catalog", &self.catalog)
            .field("images", &self.images)
            .finish()
    }
}
