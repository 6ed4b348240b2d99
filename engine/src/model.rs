//! Domain types: local catalog records, merge patches, run summaries.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-run summaries surface at most this many error strings to the caller.
/// Everything is still logged internally.
pub const MAX_SUMMARY_ERRORS: usize = 10;

/// One user-owned catalog entry.
///
/// `genres` and `tracks` are lists in memory and JSON string blobs in
/// storage; an empty list means "not set" for merge purposes.
/// `description_note` is exclusively user-authored: the merge engine never
/// populates or overwrites it from a remote entry or a duplicate sibling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalRecord {
    pub id: String,
    pub owner: String,
    pub collection_id: Option<String>,
    /// Remote release id, set once the record is matched to the provider.
    pub external_id: Option<i64>,
    pub artist: String,
    pub title: String,
    pub year: Option<i32>,
    pub image_url: Option<String>,
    pub genres: Vec<String>,
    pub label: Option<String>,
    pub format_name: Option<String>,
    pub catalog_number: Option<String>,
    pub country: Option<String>,
    pub tracks: Vec<Track>,
    pub description_note: Option<String>,
    pub rating: Option<i16>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<f64>,
    pub purchase_currency: Option<String>,
    pub purchase_location: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LocalRecord {
    /// A blank record owned by `owner`, assigned to `collection_id`.
    /// Fields are filled in afterwards by merging a [`RecordPatch`].
    pub fn blank(owner: &str, collection_id: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: cuid2::create_id(),
            owner: owner.to_string(),
            collection_id: Some(collection_id.to_string()),
            external_id: None,
            artist: String::new(),
            title: String::new(),
            year: None,
            image_url: None,
            genres: Vec::new(),
            label: None,
            format_name: None,
            catalog_number: None,
            country: None,
            tracks: Vec::new(),
            description_note: None,
            rating: None,
            purchase_date: None,
            purchase_price: None,
            purchase_currency: None,
            purchase_location: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One track on a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub position: Option<String>,
    pub title: String,
    pub duration: Option<String>,
}

/// The mergeable subset of a record's fields, sourced from a remote entry
/// or from a duplicate sibling.
///
/// There is deliberately no `description_note` here: a patch structurally
/// cannot carry one, so the merge engine cannot be misused to clobber it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub external_id: Option<i64>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub image_url: Option<String>,
    pub genres: Vec<String>,
    pub label: Option<String>,
    pub format_name: Option<String>,
    pub catalog_number: Option<String>,
    pub country: Option<String>,
    pub tracks: Vec<Track>,
    pub rating: Option<i16>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<f64>,
    pub purchase_currency: Option<String>,
    pub purchase_location: Option<String>,
}

impl RecordPatch {
    /// The mergeable fields of an existing record, used when folding a
    /// duplicate sibling into the canonical record.
    pub fn from_record(record: &LocalRecord) -> Self {
        Self {
            external_id: record.external_id,
            artist: non_blank(&record.artist),
            title: non_blank(&record.title),
            year: record.year,
            image_url: record.image_url.clone(),
            genres: record.genres.clone(),
            label: record.label.clone(),
            format_name: record.format_name.clone(),
            catalog_number: record.catalog_number.clone(),
            country: record.country.clone(),
            tracks: record.tracks.clone(),
            rating: record.rating,
            purchase_date: record.purchase_date,
            purchase_price: record.purchase_price,
            purchase_currency: record.purchase_currency.clone(),
            purchase_location: record.purchase_location.clone(),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Result of one sync run. Not persisted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncSummary {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
    pub pages: u32,
    /// First [`MAX_SUMMARY_ERRORS`] error messages; the rest are only logged.
    pub errors: Vec<String>,
}

impl SyncSummary {
    pub fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_SUMMARY_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Result of one consolidation run. Not persisted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DedupeSummary {
    pub merged_groups: u32,
    pub removed_records: u32,
    pub errors: Vec<String>,
}

impl DedupeSummary {
    pub fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_SUMMARY_ERRORS {
            self.errors.push(message);
        }
    }
}
