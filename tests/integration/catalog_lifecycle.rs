use std::sync::Arc;

use pollen_catalog::catalog::{
    sample_records, CatalogManager, Measurement, NewRecord, Record, RecordPatch, SortOrder,
    StorageMode,
};
use pollen_catalog::codec::ImageFetcher;
use pollen_catalog::config::{ImagesConfig, SeedConfig};
use pollen_catalog::images::{ImageLookup, ImageRepository, ImageSource};
use pollen_catalog::store::{Collection, ObjectStore};
use pollen_catalog::CatalogSession;
use tempfile::TempDir;

use crate::integration::support::{
    fallback_cache, open_store, test_config, FailingStore, ReadOnlyStore, RecordingStore,
    StubFetcher,
};

fn manager_over(
    root: &std::path::Path,
    store: Option<Arc<dyn ObjectStore>>,
    fetcher: Arc<dyn ImageFetcher>,
) -> CatalogManager {
    let images = Arc::new(ImageRepository::new(
        store.clone(),
        fallback_cache(root, 1024 * 1024),
        &ImagesConfig::default(),
    ));
    CatalogManager::new(store, images, fetcher, SeedConfig::default())
}

fn test_fields() -> NewRecord {
    NewRecord {
        latin_name: "Test sp.".to_string(),
        arabic_name: Some("نبات تجريبي".to_string()),
        species: "Test species".to_string(),
        family: "Testaceae".to_string(),
        plant_origin: "Laboratory".to_string(),
        measurement: Measurement {
            polar: "30 µm".to_string(),
            equatorial: "32 µm".to_string(),
        },
        dispersal: "Anemophilous".to_string(),
        aperture: "Monoporate".to_string(),
        morph_type: "Spheroidal".to_string(),
        pattern: "Psilate".to_string(),
        images: vec!["https://example.org/test.png".to_string()],
        featured: None,
    }
}

fn by_id(mut records: Vec<Record>) -> Vec<Record> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

#[tokio::test]
async fn empty_store_is_seeded_and_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = open_store(temp_dir.path()).await;
    let fetcher = Arc::new(StubFetcher::default());
    let catalog = manager_over(temp_dir.path(), Some(Arc::clone(&store)), fetcher.clone());

    assert!(catalog.is_loading());
    assert_eq!(catalog.initialize().await, StorageMode::Persistent);
    assert!(!catalog.is_loading());

    assert_eq!(catalog.len(), sample_records().len());
    assert_eq!(
        store.get_all(Collection::Records).await.unwrap().len(),
        sample_records().len()
    );
    assert_eq!(fetcher.calls().len(), 3);

    for record in catalog.records() {
        assert_eq!(record.images.len(), 1);
        assert!(record.images[0].starts_with("img-"));
        assert!(matches!(
            catalog.images().get_image(&record.images[0]).await,
            ImageLookup::Found {
                source: ImageSource::Primary,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn unreachable_seed_image_keeps_its_url() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = open_store(temp_dir.path()).await;
    let pine = sample_records()[1].images[0].clone();
    let fetcher = Arc::new(StubFetcher::failing_for(&[pine.as_str()]));
    let catalog = manager_over(temp_dir.path(), Some(store), fetcher);

    catalog.initialize().await;

    let record = catalog.find("2").unwrap();
    assert_eq!(record.images, vec![pine.clone()]);
    assert_eq!(
        catalog.images().get_image(&pine).await,
        ImageLookup::Url(pine)
    );
    assert!(catalog.find("1").unwrap().images[0].starts_with("img-"));
}

#[tokio::test]
async fn create_schedules_full_replace() {
    let temp_dir = TempDir::new().unwrap();
    let recording = Arc::new(RecordingStore::new(open_store(temp_dir.path()).await));
    let store: Arc<dyn ObjectStore> = recording.clone();
    let catalog = manager_over(
        temp_dir.path(),
        Some(store),
        Arc::new(StubFetcher::default()),
    );
    catalog.initialize().await;
    let before = catalog.len();

    let created = catalog.create(test_fields());
    assert_eq!(catalog.len(), before + 1);
    catalog.flush().await;

    let calls = recording.replace_all_calls();
    assert_eq!(calls.last(), Some(&(Collection::Records, before + 1)));
    assert_eq!(catalog.persist_stats().unwrap().failed, 0);

    let found = catalog.find(&created.id).unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn created_record_preserves_every_field() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = manager_over(temp_dir.path(), None, Arc::new(StubFetcher::default()));
    catalog.initialize().await;

    let fields = test_fields();
    let created = catalog.create(fields.clone());
    let found = catalog.find(&created.id).unwrap();

    assert_eq!(found.latin_name, fields.latin_name);
    assert_eq!(found.arabic_name, fields.arabic_name);
    assert_eq!(found.species, fields.species);
    assert_eq!(found.family, fields.family);
    assert_eq!(found.plant_origin, fields.plant_origin);
    assert_eq!(found.measurement, fields.measurement);
    assert_eq!(found.dispersal, fields.dispersal);
    assert_eq!(found.aperture, fields.aperture);
    assert_eq!(found.morph_type, fields.morph_type);
    assert_eq!(found.pattern, fields.pattern);
    assert_eq!(found.images, fields.images);
    assert_eq!(found.featured, None);
    assert!(found.created_at <= chrono::Utc::now());
}

#[tokio::test]
async fn delete_removes_exactly_one_and_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = manager_over(temp_dir.path(), None, Arc::new(StubFetcher::default()));
    catalog.initialize().await;
    let before = catalog.records();

    let removed = catalog.delete("2").unwrap();
    assert_eq!(removed.latin_name, "Pinus sylvestris");
    let expected: Vec<Record> = before.iter().filter(|r| r.id != "2").cloned().collect();
    assert_eq!(catalog.records(), expected);

    assert!(catalog.delete("2").is_none());
    assert_eq!(catalog.records(), expected);
}

#[tokio::test]
async fn update_changes_only_the_patched_field() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = manager_over(temp_dir.path(), None, Arc::new(StubFetcher::default()));
    catalog.initialize().await;
    let before = catalog.find("3").unwrap();
    let others: Vec<Record> = catalog.records().into_iter().filter(|r| r.id != "3").collect();

    let updated = catalog
        .update(
            "3",
            RecordPatch {
                pattern: Some("Psilate".to_string()),
                ..RecordPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.pattern, "Psilate");
    assert_eq!(
        Record {
            pattern: before.pattern.clone(),
            ..updated.clone()
        },
        before
    );
    assert_eq!(catalog.find("3").unwrap(), updated);
    let others_after: Vec<Record> = catalog.records().into_iter().filter(|r| r.id != "3").collect();
    assert_eq!(others_after, others);
}

#[tokio::test]
async fn working_set_round_trips_through_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = open_store(temp_dir.path()).await;

    let first = manager_over(
        temp_dir.path(),
        Some(Arc::clone(&store)),
        Arc::new(StubFetcher::default()),
    );
    first.initialize().await;
    first.create(test_fields());
    first.update(
        "1",
        RecordPatch {
            arabic_name: Some(None),
            featured: Some(false),
            ..RecordPatch::default()
        },
    );
    first.delete("2");
    first.flush().await;

    let fetcher = Arc::new(StubFetcher::default());
    let second = manager_over(temp_dir.path(), Some(store), fetcher.clone());
    assert_eq!(second.initialize().await, StorageMode::Persistent);

    assert_eq!(by_id(second.records()), by_id(first.records()));
    assert!(fetcher.calls().is_empty());

    let newest_loaded = second
        .records()
        .iter()
        .filter_map(|r| r.id.parse::<u64>().ok())
        .max()
        .unwrap();
    let created = second.create(NewRecord::default());
    assert!(created.id.parse::<u64>().unwrap() > newest_loaded);
}

#[tokio::test]
async fn unreadable_store_degrades_to_sample_records() {
    let temp_dir = TempDir::new().unwrap();
    let recording = Arc::new(RecordingStore::new(Arc::new(FailingStore)));
    let store: Arc<dyn ObjectStore> = recording.clone();
    let catalog = manager_over(
        temp_dir.path(),
        Some(store),
        Arc::new(StubFetcher::default()),
    );

    assert_eq!(catalog.initialize().await, StorageMode::Degraded);
    assert!(!catalog.is_loading());
    assert_eq!(by_id(catalog.records()), by_id(sample_records()));

    catalog.create(test_fields());
    catalog.flush().await;
    assert!(recording.replace_all_calls().is_empty());
    assert_eq!(catalog.len(), sample_records().len() + 1);
}

#[tokio::test]
async fn write_failures_do_not_roll_back_memory() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> =
        Arc::new(ReadOnlyStore::new(open_store(temp_dir.path()).await));
    let catalog = manager_over(
        temp_dir.path(),
        Some(store),
        Arc::new(StubFetcher::default()),
    );
    catalog.initialize().await;

    let created = catalog.create(test_fields());
    catalog.flush().await;

    assert!(catalog.find(&created.id).is_some());
    assert_eq!(catalog.persist_stats().unwrap().failed, 1);
}

#[tokio::test]
async fn queries_over_the_working_set() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = manager_over(temp_dir.path(), None, Arc::new(StubFetcher::default()));
    catalog.initialize().await;

    assert_eq!(catalog.filter("").len(), 3);
    assert_eq!(catalog.filter("PINACEAE").len(), 1);
    assert_eq!(catalog.filter("البتولا").len(), 1);
    assert_eq!(catalog.filter("europe")[0].id, "3");
    assert_eq!(catalog.filter("birch"), catalog.filter("birch"));

    let featured: Vec<String> = catalog.featured().into_iter().map(|r| r.id).collect();
    assert_eq!(featured, vec!["1", "3"]);

    let recent: Vec<String> = catalog.recent(2).into_iter().map(|r| r.id).collect();
    assert_eq!(recent, vec!["3", "2"]);

    assert_eq!(
        catalog.families(),
        vec!["Asteraceae", "Betulaceae", "Pinaceae"]
    );
    assert_eq!(catalog.sorted(SortOrder::Name)[0].latin_name, "Betula pendula");
}

#[tokio::test]
async fn session_open_seeds_fresh_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let session = CatalogSession::open_with_fetcher(&config, Arc::new(StubFetcher::default()))
        .await
        .unwrap();

    assert!(!session.is_loading());
    assert_eq!(session.storage_mode(), StorageMode::Persistent);
    assert_eq!(session.records().len(), 3);
    assert!(temp_dir.path().join("pollenpedia").is_dir());

    let key = session
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap();
    assert_eq!(
        session.get_image(&key).await.into_source().as_deref(),
        Some("data:image/png;base64,AA==")
    );
    assert_eq!(session.filtered("sunflower").len(), 1);
}

#[tokio::test]
async fn session_survives_unopenable_store() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("pollenpedia"), b"not a database").unwrap();
    let config = test_config(temp_dir.path());

    let session = CatalogSession::open_with_fetcher(&config, Arc::new(StubFetcher::default()))
        .await
        .unwrap();

    assert!(!session.is_loading());
    assert_eq!(session.storage_mode(), StorageMode::Degraded);
    assert!(!session.records().is_empty());

    let key = session
        .save_image("data:image/png;base64,AA==".to_string(), None)
        .await
        .unwrap();
    assert!(matches!(
        session.get_image(&key).await,
        ImageLookup::Found {
            source: ImageSource::Fallback,
            ..
        }
    ));
}

#[tokio::test]
async fn loading_signal_settles_once() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = open_store(temp_dir.path()).await;
    let config = test_config(temp_dir.path());
    let session = CatalogSession::from_parts(
        Some(store),
        fallback_cache(temp_dir.path(), 1024 * 1024),
        Arc::new(StubFetcher::default()),
        &config,
    );
    assert!(session.is_loading());

    let handle = session.start();
    session.wait_until_loaded().await;
    assert!(!session.is_loading());
    assert_eq!(handle.await.unwrap(), StorageMode::Persistent);

    assert_eq!(session.initialize().await, StorageMode::Persistent);
    assert!(!session.is_loading());
    assert_eq!(session.records().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_persist_the_final_working_set() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = open_store(temp_dir.path()).await;
    let catalog = Arc::new(manager_over(
        temp_dir.path(),
        Some(Arc::clone(&store)),
        Arc::new(StubFetcher::default()),
    ));
    catalog.initialize().await;

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let catalog = Arc::clone(&catalog);
            scope.spawn(move || {
                for i in 0..25 {
                    let created = catalog.create(NewRecord {
                        latin_name: format!("Worker {} sp. {}", worker, i),
                        ..NewRecord::default()
                    });
                    if i % 5 == 0 {
                        catalog.delete(&created.id);
                    }
                }
            });
        }
    });
    catalog.flush().await;

    assert_eq!(catalog.len(), 3 + 8 * 20);
    let stored = store.get_all(Collection::Records).await.unwrap();
    assert_eq!(stored.len(), catalog.len());
}
