//! Field merge engine.
//!
//! One rule everywhere: a field transition is always empty → filled, never
//! filled → different-filled. That makes merging idempotent and order-stable,
//! so re-running a sync or folding siblings in either direction converges.

use crate::model::{LocalRecord, RecordPatch};

/// Fill every empty field of `record` from `patch`; populated fields are
/// kept as they are. Pure function, no side effects beyond the returned
/// value; `updated_at` is left for the store to bump on persist.
pub fn merge(record: &LocalRecord, patch: &RecordPatch) -> LocalRecord {
    let mut out = record.clone();

    if out.external_id.is_none() {
        out.external_id = patch.external_id;
    }
    if out.artist.trim().is_empty() {
        if let Some(artist) = &patch.artist {
            out.artist = artist.clone();
        }
    }
    if out.title.trim().is_empty() {
        if let Some(title) = &patch.title {
            out.title = title.clone();
        }
    }
    if out.year.is_none() {
        out.year = patch.year;
    }
    fill_text(&mut out.image_url, &patch.image_url);
    if out.genres.is_empty() && !patch.genres.is_empty() {
        out.genres = patch.genres.clone();
    }
    fill_text(&mut out.label, &patch.label);
    fill_text(&mut out.format_name, &patch.format_name);
    fill_text(&mut out.catalog_number, &patch.catalog_number);
    fill_text(&mut out.country, &patch.country);
    if out.tracks.is_empty() && !patch.tracks.is_empty() {
        out.tracks = patch.tracks.clone();
    }
    if out.rating.is_none() {
        out.rating = patch.rating;
    }
    if out.purchase_date.is_none() {
        out.purchase_date = patch.purchase_date;
    }
    if out.purchase_price.is_none() {
        out.purchase_price = patch.purchase_price;
    }
    fill_text(&mut out.purchase_currency, &patch.purchase_currency);
    fill_text(&mut out.purchase_location, &patch.purchase_location);

    out
}

/// Null and all-whitespace both count as empty for text fields.
fn fill_text(target: &mut Option<String>, source: &Option<String>) {
    let blank = target.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank {
        if let Some(value) = source.as_deref().filter(|s| !s.trim().is_empty()) {
            *target = Some(value.to_string());
        }
    }
}
