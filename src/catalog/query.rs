//! Linear queries over the working set.

use crate::catalog::record::Record;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

/// Display orderings for record listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Name,
    Family,
    /// Newest first
    Recent,
}

/// Canonical form used for case-insensitive matching
pub fn normalize(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

/// True when any searchable field contains the normalized query.
pub fn matches(record: &Record, normalized_query: &str) -> bool {
    if normalized_query.is_empty() {
        return true;
    }
    let mut fields = [
        Some(record.latin_name.as_str()),
        record.arabic_name.as_deref(),
        Some(record.species.as_str()),
        Some(record.family.as_str()),
        Some(record.plant_origin.as_str()),
    ]
    .into_iter()
    .flatten();
    fields.any(|field| normalize(field).contains(normalized_query))
}

/// Records matching `query` on latin name, arabic name, species, family or origin.
/// Empty query matches everything; order follows the working set.
pub fn filter(records: &[Record], query: &str) -> Vec<Record> {
    let query = normalize(query);
    records
        .iter()
        .filter(|record| matches(record, &query))
        .cloned()
        .collect()
}

/// Sort records in place for display.
pub fn sort(records: &mut [Record], order: SortOrder) {
    match order {
        SortOrder::Name => records.sort_by(|a, b| {
            normalize(&a.latin_name)
                .cmp(&normalize(&b.latin_name))
                .then_with(|| a.latin_name.cmp(&b.latin_name))
        }),
        SortOrder::Family => records.sort_by(|a, b| {
            normalize(&a.family)
                .cmp(&normalize(&b.family))
                .then_with(|| a.family.cmp(&b.family))
        }),
        SortOrder::Recent => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

/// Featured records, in working-set order
pub fn featured(records: &[Record]) -> Vec<Record> {
    records.iter().filter(|r| r.is_featured()).cloned().collect()
}

/// The `limit` most recently created records, newest first
pub fn recent(records: &[Record], limit: usize) -> Vec<Record> {
    let mut sorted = records.to_vec();
    sort(&mut sorted, SortOrder::Recent);
    sorted.truncate(limit);
    sorted
}

/// Distinct family names, sorted
pub fn families(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.family.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
