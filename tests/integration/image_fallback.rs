use std::sync::Arc;

use pollen_catalog::codec::{decode_data_uri, encode_bytes};
use pollen_catalog::config::ImagesConfig;
use pollen_catalog::error::{ImageError, StoreError};
use pollen_catalog::images::{FallbackCache, ImageLookup, ImageRepository, ImageSource};
use pollen_catalog::store::ObjectStore;
use tempfile::TempDir;

use crate::integration::support::{
    fallback_cache, open_store, CountingCache, FailingStore, StubFetcher, PNG_BYTES,
};

fn repository(
    primary: Option<Arc<dyn ObjectStore>>,
    fallback: Arc<dyn FallbackCache>,
) -> ImageRepository {
    ImageRepository::new(primary, fallback, &ImagesConfig::default())
}

#[tokio::test]
async fn saved_image_reads_back_identical_and_is_mirrored() {
    let temp_dir = TempDir::new().unwrap();
    let fallback = fallback_cache(temp_dir.path(), 1024 * 1024);
    let images = repository(Some(open_store(temp_dir.path()).await), Arc::clone(&fallback));

    let data = encode_bytes("image/png", &PNG_BYTES);
    let key = images.save_image(data.clone(), None).await.unwrap();
    assert!(key.starts_with("img-"));

    assert_eq!(
        images.get_image(&key).await,
        ImageLookup::Found {
            data: data.clone(),
            source: ImageSource::Primary
        }
    );
    assert_eq!(
        fallback.get(&images.fallback_key(&key)).await.unwrap(),
        Some(data)
    );
}

#[tokio::test]
async fn caller_supplied_key_is_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 1024 * 1024),
    );

    images.save_image("data:image/png;base64,AA==".to_string(), Some("cover")).await.unwrap();
    images.save_image("data:image/png;base64,AQ==".to_string(), Some("cover")).await.unwrap();

    let lookup = images.get_image("cover").await;
    assert_eq!(lookup.into_source().as_deref(), Some("data:image/png;base64,AQ=="));
}

#[tokio::test]
async fn url_keys_pass_through_without_storage() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(Some(Arc::new(FailingStore)), fallback_cache(temp_dir.path(), 16));

    for url in [
        "https://images.unsplash.com/photo-1509316975850-ff9c5deb0cd9",
        "HTTP://example.org/a.png",
        "data:image/png;base64,AA==",
        "blob:abc",
    ] {
        assert_eq!(images.get_image(url).await, ImageLookup::Url(url.to_string()));
    }
    assert!(!temp_dir.path().join("fallback-cache").exists());
}

#[tokio::test]
async fn absent_key_is_unavailable_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 1024),
    );

    let lookup = images.get_image("img-404").await;
    assert_eq!(lookup, ImageLookup::Unavailable);
    assert!(!lookup.is_available());
    assert_eq!(images.get_image("").await, ImageLookup::Unavailable);
}

#[tokio::test]
async fn primary_miss_recovers_from_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let fallback = fallback_cache(temp_dir.path(), 1024);
    let images = repository(Some(open_store(temp_dir.path()).await), Arc::clone(&fallback));

    fallback
        .set(&images.fallback_key("img-7"), "data:image/gif;base64,R0lG")
        .await
        .unwrap();

    assert_eq!(
        images.get_image("img-7").await,
        ImageLookup::Found {
            data: "data:image/gif;base64,R0lG".to_string(),
            source: ImageSource::Fallback
        }
    );
}

#[tokio::test]
async fn primary_read_failure_recovers_from_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let fallback = fallback_cache(temp_dir.path(), 1024);
    let images = repository(Some(Arc::new(FailingStore)), Arc::clone(&fallback));

    fallback.set("image-img-8", "data:image/png;base64,AA==").await.unwrap();

    let lookup = images.get_image("img-8").await;
    assert!(matches!(
        lookup,
        ImageLookup::Found {
            source: ImageSource::Fallback,
            ..
        }
    ));
}

#[tokio::test]
async fn save_propagates_primary_write_failure() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(Some(Arc::new(FailingStore)), fallback_cache(temp_dir.path(), 1024));

    let err = images
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Store(StoreError::WriteFailed(_))));
}

#[tokio::test]
async fn mirror_quota_failure_does_not_fail_save() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 4),
    );

    let data = encode_bytes("image/png", &PNG_BYTES);
    let key = images.save_image(data.clone(), None).await.unwrap();
    assert_eq!(
        images.get_image(&key).await,
        ImageLookup::Found {
            data,
            source: ImageSource::Primary
        }
    );
}

#[tokio::test]
async fn without_primary_the_fallback_is_the_only_tier() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(None, fallback_cache(temp_dir.path(), 1024));

    let key = images
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap();
    assert!(matches!(
        images.get_image(&key).await,
        ImageLookup::Found {
            source: ImageSource::Fallback,
            ..
        }
    ));

    let tiny = repository(None, fallback_cache(&temp_dir.path().join("tiny"), 2));
    let err = tiny
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Cache(_)));
}

#[tokio::test]
async fn upload_is_validated_and_encoded() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 1024 * 1024),
    );

    let photo = temp_dir.path().join("grain.png");
    std::fs::write(&photo, PNG_BYTES).unwrap();
    let key = images.save_upload(&photo).await.unwrap();
    let data = images.get_image(&key).await.into_source().unwrap();
    let decoded = decode_data_uri(&data).unwrap();
    assert_eq!(decoded.mime, "image/png");
    assert_eq!(decoded.bytes, PNG_BYTES.to_vec());

    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, "hello world").unwrap();
    assert!(matches!(
        images.save_upload(&notes).await,
        Err(ImageError::InvalidUpload(_))
    ));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = ImagesConfig {
        max_upload_bytes: 4,
        ..ImagesConfig::default()
    };
    let images = ImageRepository::new(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 1024),
        &config,
    );

    let photo = temp_dir.path().join("big.png");
    std::fs::write(&photo, PNG_BYTES).unwrap();
    assert!(matches!(
        images.save_upload(&photo).await,
        Err(ImageError::InvalidUpload(_))
    ));
}

#[tokio::test]
async fn remote_image_is_fetched_and_stored() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(
        Some(open_store(temp_dir.path()).await),
        fallback_cache(temp_dir.path(), 1024 * 1024),
    );
    let fetcher = StubFetcher::default();

    let key = images
        .save_from_url(&fetcher, "https://example.org/grain.png")
        .await
        .unwrap();
    assert_eq!(fetcher.calls(), vec!["https://example.org/grain.png"]);
    let data = images.get_image(&key).await.into_source().unwrap();
    assert_eq!(data, encode_bytes("image/png", &PNG_BYTES));

    let unreachable = StubFetcher::failing_for(&["https://example.org/gone.png"]);
    assert!(matches!(
        images.save_from_url(&unreachable, "https://example.org/gone.png").await,
        Err(ImageError::Codec(_))
    ));
}

#[tokio::test]
async fn long_keys_round_trip_with_primary() {
    let temp_dir = TempDir::new().unwrap();
    let fallback = fallback_cache(temp_dir.path(), 1024 * 1024);
    let images = repository(Some(open_store(temp_dir.path()).await), Arc::clone(&fallback));
    let key = "k".repeat(200);

    let saved = images
        .save_image("data:image/png;base64,AA==".to_string(), Some(&key))
        .await
        .unwrap();
    assert_eq!(saved, key);
    assert_eq!(
        fallback.get(&images.fallback_key(&key)).await.unwrap().as_deref(),
        Some("data:image/png;base64,AA==")
    );
    assert!(matches!(
        images.get_image(&key).await,
        ImageLookup::Found {
            source: ImageSource::Primary,
            ..
        }
    ));
}

#[tokio::test]
async fn long_keys_round_trip_without_primary() {
    let temp_dir = TempDir::new().unwrap();
    let images = repository(None, fallback_cache(temp_dir.path(), 1024 * 1024));
    let key = "k".repeat(200);

    images
        .save_image("data:image/png;base64,AA==".to_string(), Some(&key))
        .await
        .unwrap();
    assert_eq!(
        images.get_image(&key).await,
        ImageLookup::Found {
            data: "data:image/png;base64,AA==".to_string(),
            source: ImageSource::Fallback
        }
    );
}

#[tokio::test]
async fn repeated_primary_hits_do_not_rewrite_the_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let counting = Arc::new(CountingCache::new(fallback_cache(temp_dir.path(), 1024 * 1024)));
    let fallback: Arc<dyn FallbackCache> = counting.clone();
    let images = repository(Some(open_store(temp_dir.path()).await), fallback);

    let key = images
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap();
    assert_eq!(counting.set_calls(), 1);

    for _ in 0..3 {
        assert!(images.get_image(&key).await.is_available());
    }
    assert_eq!(counting.set_calls(), 1);

    images
        .save_image("data:image/png;base64,AQ==".to_string(), Some(&key))
        .await
        .unwrap();
    assert_eq!(counting.set_calls(), 2);
}
