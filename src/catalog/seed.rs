//! First-run sample records.

use crate::catalog::record::{Measurement, NewRecord, Record};
use chrono::{DateTime, TimeZone, Utc};

fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn measurement(polar: &str, equatorial: &str) -> Measurement {
    Measurement {
        polar: polar.to_string(),
        equatorial: equatorial.to_string(),
    }
}

/// The fixed sample set adopted when the store holds no records.
///
/// Image references are remote URLs; first-run initialization converts them
/// into stored image blobs.
pub fn sample_records() -> Vec<Record> {
    vec![
        Record::new(
            "1".to_string(),
            day(2023, 1, 15),
            NewRecord {
                latin_name: "Helianthus annuus".to_string(),
                arabic_name: Some("عباد الشمس".to_string()),
                species: "Sunflower".to_string(),
                family: "Asteraceae".to_string(),
                plant_origin: "North America".to_string(),
                measurement: measurement("25-30 µm", "28-32 µm"),
                dispersal: "Zoophilous".to_string(),
                aperture: "Tricolporate".to_string(),
                morph_type: "Prolate spheroidal".to_string(),
                pattern: "Echinate".to_string(),
                images: vec![
                    "https://images.unsplash.com/photo-1509316975850-ff9c5deb0cd9".to_string(),
                ],
                featured: Some(true),
            },
        ),
        Record::new(
            "2".to_string(),
            day(2023, 2, 10),
            NewRecord {
                latin_name: "Pinus sylvestris".to_string(),
                arabic_name: Some("الصنوبر الاسكتلندي".to_string()),
                species: "Scots pine".to_string(),
                family: "Pinaceae".to_string(),
                plant_origin: "Eurasia".to_string(),
                measurement: measurement("40-50 µm", "60-70 µm"),
                dispersal: "Anemophilous".to_string(),
                aperture: "Saccate".to_string(),
                morph_type: "Bisaccate".to_string(),
                pattern: "Verrucate".to_string(),
                images: vec![
                    "https://images.unsplash.com/photo-1465146344425-f00d5f5c8f07".to_string(),
                ],
                featured: None,
            },
        ),
        Record::new(
            "3".to_string(),
            day(2023, 3, 5),
            NewRecord {
                latin_name: "Betula pendula".to_string(),
                arabic_name: Some("البتولا الفضية".to_string()),
                species: "Silver birch".to_string(),
                family: "Betulaceae".to_string(),
                plant_origin: "Europe".to_string(),
                measurement: measurement("18-22 µm", "22-25 µm"),
                dispersal: "Anemophilous".to_string(),
                aperture: "Triporate".to_string(),
                morph_type: "Oblate spheroidal".to_string(),
                pattern: "Scabrate".to_string(),
                images: vec![
                    "https://images.unsplash.com/photo-1493962853295-0fd70327578a".to_string(),
                ],
                featured: Some(true),
            },
        ),
    ]
}
