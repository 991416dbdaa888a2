//! Record model and its stored representation.
//!
//! Creation timestamps cross the store boundary as fixed-format UTC text
//! (`CREATED_AT_FORMAT`) and are parsed back on read.

use crate::error::StoreError;
use crate::types::{ImageKey, RecordId};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Storage format for creation timestamps; sorts lexicographically in time order.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Pollen grain dimensions, free text (e.g. "25-30 µm")
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub polar: String,
    pub equatorial: String,
}

/// One catalog entry describing a pollen specimen
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub latin_name: String,
    pub arabic_name: Option<String>,
    pub species: String,
    pub family: String,
    pub plant_origin: String,
    pub measurement: Measurement,
    pub dispersal: String,
    pub aperture: String,
    pub morph_type: String,
    pub pattern: String,
    /// Image keys or URLs, in display order
    pub images: Vec<ImageKey>,
    pub created_at: DateTime<Utc>,
    pub featured: Option<bool>,
}

/// Fields supplied when creating a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    pub latin_name: String,
    pub arabic_name: Option<String>,
    pub species: String,
    pub family: String,
    pub plant_origin: String,
    pub measurement: Measurement,
    pub dispersal: String,
    pub aperture: String,
    pub morph_type: String,
    pub pattern: String,
    pub images: Vec<ImageKey>,
    pub featured: Option<bool>,
}

/// Partial update. Identity and creation time are not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub latin_name: Option<String>,
    /// `Some(None)` clears the alternate-script name
    pub arabic_name: Option<Option<String>>,
    pub species: Option<String>,
    pub family: Option<String>,
    pub plant_origin: Option<String>,
    pub measurement: Option<Measurement>,
    pub dispersal: Option<String>,
    pub aperture: Option<String>,
    pub morph_type: Option<String>,
    pub pattern: Option<String>,
    pub images: Option<Vec<ImageKey>>,
    pub featured: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

impl Record {
    /// Build a record from creation fields. `created_at` is truncated to
    /// milliseconds so it survives the storage format unchanged.
    pub fn new(id: RecordId, created_at: DateTime<Utc>, fields: NewRecord) -> Self {
        Self {
            id,
            latin_name: fields.latin_name,
            arabic_name: fields.arabic_name,
            species: fields.species,
            family: fields.family,
            plant_origin: fields.plant_origin,
            measurement: fields.measurement,
            dispersal: fields.dispersal,
            aperture: fields.aperture,
            morph_type: fields.morph_type,
            pattern: fields.pattern,
            images: fields.images,
            created_at: created_at.trunc_subsecs(3),
            featured: fields.featured,
        }
    }

    pub fn is_featured(&self) -> bool {
        self.featured.unwrap_or(false)
    }

    /// Merge a patch; returns whether any field changed.
    pub fn apply(&mut self, patch: RecordPatch) -> bool {
        let before = self.clone();
        if let Some(v) = patch.latin_name {
            self.latin_name = v;
        }
        if let Some(v) = patch.arabic_name {
            self.arabic_name = v;
        }
        if let Some(v) = patch.species {
            self.species = v;
        }
        if let Some(v) = patch.family {
            self.family = v;
        }
        if let Some(v) = patch.plant_origin {
            self.plant_origin = v;
        }
        if let Some(v) = patch.measurement {
            self.measurement = v;
        }
        if let Some(v) = patch.dispersal {
            self.dispersal = v;
        }
        if let Some(v) = patch.aperture {
            self.aperture = v;
        }
        if let Some(v) = patch.morph_type {
            self.morph_type = v;
        }
        if let Some(v) = patch.pattern {
            self.pattern = v;
        }
        if let Some(v) = patch.images {
            self.images = v;
        }
        if let Some(v) = patch.featured {
            self.featured = Some(v);
        }
        *self != before
    }
}

/// Stored shape of a record in the `records` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: RecordId,
    pub latin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arabic_name: Option<String>,
    pub species: String,
    pub family: String,
    pub plant_origin: String,
    pub measurement: Measurement,
    pub dispersal: String,
    pub aperture: String,
    pub morph_type: String,
    pub pattern: String,
    #[serde(default)]
    pub images: Vec<ImageKey>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

impl From<&Record> for StoredRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            latin_name: record.latin_name.clone(),
            arabic_name: record.arabic_name.clone(),
            species: record.species.clone(),
            family: record.family.clone(),
            plant_origin: record.plant_origin.clone(),
            measurement: record.measurement.clone(),
            dispersal: record.dispersal.clone(),
            aperture: record.aperture.clone(),
            morph_type: record.morph_type.clone(),
            pattern: record.pattern.clone(),
            images: record.images.clone(),
            created_at: record.created_at.format(CREATED_AT_FORMAT).to_string(),
            featured: record.featured,
        }
    }
}

impl TryFrom<StoredRecord> for Record {
    type Error = StoreError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&stored.created_at)
            .map_err(|e| {
                StoreError::ReadFailed(format!(
                    "Record {} has invalid createdAt '{}': {}",
                    stored.id, stored.created_at, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            id: stored.id,
            latin_name: stored.latin_name,
            arabic_name: stored.arabic_name,
            species: stored.species,
            family: stored.family,
            plant_origin: stored.plant_origin,
            measurement: stored.measurement,
            dispersal: stored.dispersal,
            aperture: stored.aperture,
            morph_type: stored.morph_type,
            pattern: stored.pattern,
            images: stored.images,
            created_at,
            featured: stored.featured,
        })
    }
}
