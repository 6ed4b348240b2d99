//! Identity heuristics.
//!
//! Everything fuzzy lives here, as named functions, so the heuristic nature
//! of the matching is visible in one place and swappable: the rest of the
//! pipeline only depends on [`resolve`] and [`group_key`].
//!
//! External ids are the reliable key once established. The fuzzy path exists
//! solely to attach an external id to a record the user entered by hand
//! before ever syncing, so it is conservative: records that already carry an
//! external id are never fuzzy-match candidates.

use crate::error::Result;
use crate::model::LocalRecord;
use crate::remote::RemoteEntry;
use crate::store::CatalogStore;

/// Shared normalization for duplicate-group keys: lower-case + trim.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Duplicate-group key. Intentionally coarse: two distinct releases that
/// share artist and title (e.g. different pressings) will share a key.
pub fn group_key(artist: &str, title: &str) -> String {
    format!("{}::{}", normalize(artist), normalize(title))
}

/// First comma-separated token of a remote artist string
/// ("Miles Davis, John Coltrane" -> "Miles Davis").
pub fn artist_fragment(artist: &str) -> String {
    artist.split(',').next().unwrap_or("").trim().to_string()
}

/// First three whitespace-separated tokens of a remote title.
pub fn title_fragment(title: &str) -> String {
    title
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pick the best fuzzy candidate out of the store's containment matches.
///
/// Prefers a candidate whose artist contains the remote artist's first token
/// and whose title contains the first 20 characters of the remote title,
/// both lower-cased; otherwise the first candidate as returned by storage
/// (creation order, so the tie-break is deterministic).
pub fn prefer_candidate<'a>(
    remote_artist: &str,
    remote_title: &str,
    candidates: &'a [LocalRecord],
) -> Option<&'a LocalRecord> {
    let artist_token = artist_fragment(remote_artist).to_lowercase();
    let title_prefix: String = remote_title.to_lowercase().chars().take(20).collect();

    candidates
        .iter()
        .find(|c| {
            c.artist.to_lowercase().contains(&artist_token)
                && c.title.to_lowercase().contains(&title_prefix)
        })
        .or_else(|| candidates.first())
}

/// Find the local record a remote entry refers to, if any.
///
/// Exact match on `(owner, external_id)` first; fuzzy containment match on
/// unlinked records second. Best effort, not a uniqueness guarantee.
pub async fn resolve<S: CatalogStore>(
    store: &S,
    owner: &str,
    entry: &RemoteEntry,
) -> Result<Option<LocalRecord>> {
    if let Some(hit) = store.find_by_external_id(owner, entry.external_id).await? {
        return Ok(Some(hit));
    }

    let artist = artist_fragment(&entry.artist);
    let title = title_fragment(&entry.title);
    if artist.is_empty() || title.is_empty() {
        return Ok(None);
    }

    let candidates = store.fuzzy_candidates(owner, &artist, &title).await?;
    Ok(prefer_candidate(&entry.artist, &entry.title, &candidates).cloned())
}

/// Count of populated attributes, used to break canonical-pick ties.
pub fn populated_fields(r: &LocalRecord) -> usize {
    let text = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
    [
        r.external_id.is_some(),
        !r.artist.trim().is_empty(),
        !r.title.trim().is_empty(),
        r.year.is_some(),
        text(&r.image_url),
        !r.genres.is_empty(),
        text(&r.label),
        text(&r.format_name),
        text(&r.catalog_number),
        text(&r.country),
        !r.tracks.is_empty(),
        text(&r.description_note),
        r.rating.is_some(),
        r.purchase_date.is_some(),
        r.purchase_price.is_some(),
        text(&r.purchase_currency),
        text(&r.purchase_location),
    ]
    .iter()
    .filter(|b| **b)
    .count()
}

/// Index of the canonical record in a duplicate group.
///
/// Prefer a record holding an external id, then the one with strictly more
/// populated fields; ties keep the earliest-created record, which is stable
/// because groups are built from a creation-ordered load.
pub fn pick_canonical(group: &[LocalRecord]) -> usize {
    let mut best = 0;
    for (i, candidate) in group.iter().enumerate().skip(1) {
        let current = &group[best];
        let better = match (candidate.external_id.is_some(), current.external_id.is_some()) {
            (true, false) => true,
            (false, true) => false,
            _ => populated_fields(candidate) > populated_fields(current),
        };
        if better {
            best = i;
        }
    }
    best
}
