//! Image Repository
//!
//! Tiered image retrieval. URL-shaped keys pass through untouched; opaque keys
//! are looked up in the object store's `images` collection, then in the
//! fallback cache, and otherwise reported unavailable. Primary hits are
//! mirrored into the fallback cache.

pub mod fallback;

pub use fallback::{FallbackCache, FileFallbackCache};

use crate::codec::{self, Blob, ImageFetcher};
use crate::config::ImagesConfig;
use crate::error::{CodecError, ImageError};
use crate::ids::IdGenerator;
use crate::store::{from_entry, to_entry, Collection, ObjectStore};
use crate::types::{EncodedImage, ImageKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stored form of an image blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: ImageKey,
    pub data: EncodedImage,
}

/// Tier that satisfied a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Primary,
    Fallback,
}

/// Outcome of an image lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLookup {
    /// The key is itself a URL and is used verbatim
    Url(String),
    Found {
        data: EncodedImage,
        source: ImageSource,
    },
    /// Neither tier holds the key; render a placeholder
    Unavailable,
}

impl ImageLookup {
    /// Directly usable image source, if any
    pub fn into_source(self) -> Option<String> {
        match self {
            ImageLookup::Url(url) => Some(url),
            ImageLookup::Found { data, .. } => Some(data),
            ImageLookup::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, ImageLookup::Unavailable)
    }
}

/// Image blob storage with fallback cache
pub struct ImageRepository {
    primary: Option<Arc<dyn ObjectStore>>,
    fallback: Arc<dyn FallbackCache>,
    fallback_prefix: String,
    max_upload_bytes: u64,
    keys: IdGenerator,
}

impl ImageRepository {
    /// `primary` is None when the object store could not be opened.
    pub fn new(
        primary: Option<Arc<dyn ObjectStore>>,
        fallback: Arc<dyn FallbackCache>,
        config: &ImagesConfig,
    ) -> Self {
        Self {
            primary,
            fallback,
            fallback_prefix: config.fallback_prefix.clone(),
            max_upload_bytes: config.max_upload_bytes,
            keys: IdGenerator::new(),
        }
    }

    /// Key of `image_key` in the fallback namespace
    pub fn fallback_key(&self, image_key: &str) -> String {
        format!("{}{}", self.fallback_prefix, image_key)
    }

    /// Look up an image by key. Never fails; misses end in `Unavailable`.
    pub async fn get_image(&self, key: &str) -> ImageLookup {
        if codec::is_url(key) {
            return ImageLookup::Url(key.to_string());
        }
        if key.is_empty() {
            return ImageLookup::Unavailable;
        }

        if let Some(data) = self.get_from_primary(key).await {
            self.mirror(key, &data).await;
            return ImageLookup::Found {
                data,
                source: ImageSource::Primary,
            };
        }

        match self.fallback.get(&self.fallback_key(key)).await {
            Ok(Some(data)) => {
                info!(key, "Image served from fallback cache");
                ImageLookup::Found {
                    data,
                    source: ImageSource::Fallback,
                }
            }
            Ok(None) => {
                warn!(key, "No data found for image");
                ImageLookup::Unavailable
            }
            Err(e) => {
                warn!(key, error = %e, "Fallback cache read failed");
                ImageLookup::Unavailable
            }
        }
    }

    async fn get_from_primary(&self, key: &str) -> Option<EncodedImage> {
        let primary = self.primary.as_ref()?;
        match primary.get(Collection::Images, key).await {
            Ok(Some(entry)) => match from_entry::<ImageEntry>(entry) {
                Ok(image) => Some(image.data),
                Err(e) => {
                    warn!(key, error = %e, "Stored image entry is unreadable");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "Image not in object store");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Object store image read failed");
                None
            }
        }
    }

    /// Best-effort copy into the fallback cache. Skipped when the cache already
    /// holds the same value.
    async fn mirror(&self, key: &str, data: &str) {
        let fallback_key = self.fallback_key(key);
        if let Ok(Some(cached)) = self.fallback.get(&fallback_key).await {
            if cached == data {
                return;
            }
        }
        if let Err(e) = self.fallback.set(&fallback_key, data).await {
            warn!(key, error = %e, "Failed to mirror image into fallback cache");
        }
    }

    /// Store an encoded image under `key`, or under a generated `img-<millis>` key.
    ///
    /// Writes the object store when present (its failure is returned), then
    /// mirrors into the fallback cache best-effort. Without an object store the
    /// fallback cache is the only tier and its failure is returned.
    pub async fn save_image(
        &self,
        data: EncodedImage,
        key: Option<&str>,
    ) -> Result<ImageKey, ImageError> {
        let key = match key {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!("img-{}", self.keys.next_value()),
        };

        match &self.primary {
            Some(primary) => {
                let entry = to_entry(&ImageEntry {
                    id: key.clone(),
                    data: data.clone(),
                })?;
                primary.put(Collection::Images, entry).await?;
                self.mirror(&key, &data).await;
            }
            None => {
                self.fallback.set(&self.fallback_key(&key), &data).await?;
            }
        }

        debug!(key = %key, size = data.len(), "Saved image");
        Ok(key)
    }

    /// Validate, encode, and store an uploaded image file.
    pub async fn save_upload(&self, path: &Path) -> Result<ImageKey, ImageError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            CodecError::DecodeFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if metadata.len() > self.max_upload_bytes {
            return Err(ImageError::InvalidUpload(format!(
                "{} is {} bytes; the limit is {} bytes",
                path.display(),
                metadata.len(),
                self.max_upload_bytes
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            CodecError::DecodeFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let blob = Blob::new(bytes, codec::mime_from_extension(path).map(str::to_string));
        let mime = blob.resolved_mime();
        if !mime.starts_with("image/") {
            return Err(ImageError::InvalidUpload(format!(
                "{} is not an image ({})",
                path.display(),
                mime
            )));
        }

        self.save_image(codec::encode_bytes(&mime, &blob.bytes), None)
            .await
    }

    /// Fetch a remote image, encode it, and store it under a generated key.
    pub async fn save_from_url(
        &self,
        fetcher: &dyn ImageFetcher,
        url: &str,
    ) -> Result<ImageKey, ImageError> {
        let data = codec::encode_url(fetcher, url).await?;
        self.save_image(data, None).await
    }
}

impl std::fmt::Debug for ImageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRepository")
            .field("has_primary", &self.primary.is_some())
            .field("fallback_prefix", &self.fallback_prefix)
            .finish()
    }
}
