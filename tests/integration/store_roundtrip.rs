use chrono::{TimeZone, Utc};
use pollen_catalog::catalog::{persist, sample_records, NewRecord, Record, StoredRecord};
use pollen_catalog::store::{from_entry, to_entry, Collection, ObjectStore, SledStore};
use serde_json::json;
use tempfile::TempDir;

async fn load_records(store: &dyn ObjectStore) -> Vec<Record> {
    store
        .get_all(Collection::Records)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| Record::try_from(from_entry::<StoredRecord>(entry).unwrap()).unwrap())
        .collect()
}

#[tokio::test]
async fn records_survive_store_reopen_with_equal_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db");

    let mut records = sample_records();
    records.push(Record::new(
        "1700000000123".to_string(),
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        NewRecord {
            latin_name: "Test sp.".to_string(),
            species: "Test species".to_string(),
            family: "Testaceae".to_string(),
            plant_origin: "Nowhere".to_string(),
            ..NewRecord::default()
        },
    ));

    {
        let store = SledStore::open(&path).await.unwrap();
        persist(&store, &records).await.unwrap();
    }

    let reopened = SledStore::open(&path).await.unwrap();
    let mut loaded = load_records(&reopened).await;
    loaded.sort_by(|a, b| a.id.cmp(&b.id));
    records.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(loaded, records);
}

#[tokio::test]
async fn created_at_is_stored_as_text() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledStore::open(temp_dir.path().join("db")).await.unwrap();
    persist(&store, &sample_records()).await.unwrap();

    let entry = store.get(Collection::Records, "3").await.unwrap().unwrap();
    assert_eq!(entry["createdAt"], json!("2023-03-05T00:00:00.000Z"));
    assert_eq!(entry["latinName"], json!("Betula pendula"));
}

#[tokio::test]
async fn latin_name_index_orders_records() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledStore::open(temp_dir.path().join("db")).await.unwrap();
    persist(&store, &sample_records()).await.unwrap();

    let names: Vec<String> = store
        .get_all_by_index(Collection::Records, "latinName")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry["latinName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["Betula pendula", "Helianthus annuus", "Pinus sylvestris"]
    );
}

#[tokio::test]
async fn images_and_records_are_independent_collections() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledStore::open(temp_dir.path().join("db")).await.unwrap();

    store
        .put(
            Collection::Images,
            to_entry(&json!({"id": "img-1", "data": "data:image/png;base64,AA=="})).unwrap(),
        )
        .await
        .unwrap();
    persist(&store, &[]).await.unwrap();

    assert!(store.get_all(Collection::Records).await.unwrap().is_empty());
    assert!(store.get(Collection::Images, "img-1").await.unwrap().is_some());
    assert!(store.get(Collection::Images, "img-2").await.unwrap().is_none());
}
