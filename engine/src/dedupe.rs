//! Duplicate grouping and consolidation.
//!
//! A batch cleanup for records duplicated by repeated manual entry or
//! repeated sync attempts: group the owner's records by normalized
//! artist+title, fold every group into one canonical record, delete the
//! rest. Grouping is intentionally coarse; two legitimately distinct
//! releases sharing artist and title will be collapsed (known limitation,
//! no year/format disambiguation).

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::matching::{group_key, pick_canonical};
use crate::merge::merge;
use crate::model::{DedupeSummary, LocalRecord, RecordPatch};
use crate::store::CatalogStore;

/// Collapse the owner's duplicate records, one canonical record per group.
///
/// With `dry_run` set, groups are computed and counted but nothing is
/// persisted or deleted.
pub async fn consolidate_duplicates<S: CatalogStore>(
    store: &S,
    owner: &str,
    dry_run: bool,
) -> Result<DedupeSummary> {
    if owner.trim().is_empty() {
        return Err(EngineError::Precondition("no owner given".to_string()));
    }

    let records = store.load_records(owner).await?;
    let groups = group_duplicates(records);
    info!(groups = groups.len(), "found duplicate groups");

    let mut summary = DedupeSummary::default();
    for group in &groups {
        match consolidate_group(store, group, dry_run).await {
            Ok(removed) => {
                summary.merged_groups += 1;
                summary.removed_records += removed;
            }
            Err(e) => {
                // One group failing must not block the rest.
                warn!(
                    key = %group_key(&group[0].artist, &group[0].title),
                    error = %e,
                    "group consolidation failed"
                );
                summary.push_error(format!(
                    "{} - {}: {}",
                    group[0].artist, group[0].title, e
                ));
            }
        }
    }

    Ok(summary)
}

/// Group records by normalized artist+title; only groups with more than one
/// member survive. Input must be creation-ordered: members keep that order,
/// which the canonical tie-break relies on.
fn group_duplicates(records: Vec<LocalRecord>) -> Vec<Vec<LocalRecord>> {
    let mut by_key: BTreeMap<String, Vec<LocalRecord>> = BTreeMap::new();
    for record in records {
        by_key
            .entry(group_key(&record.artist, &record.title))
            .or_default()
            .push(record);
    }
    by_key.into_values().filter(|g| g.len() > 1).collect()
}

/// Fold one group into its canonical record and delete the siblings.
/// Returns the number of records removed.
async fn consolidate_group<S: CatalogStore>(
    store: &S,
    group: &[LocalRecord],
    dry_run: bool,
) -> Result<u32> {
    let canonical_idx = pick_canonical(group);
    let mut canonical = group[canonical_idx].clone();

    for (i, sibling) in group.iter().enumerate() {
        if i != canonical_idx {
            canonical = merge(&canonical, &RecordPatch::from_record(sibling));
        }
    }

    let sibling_ids: Vec<String> = group
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != canonical_idx)
        .map(|(_, r)| r.id.clone())
        .collect();

    if dry_run {
        return Ok(sibling_ids.len() as u32);
    }

    store.update_record(&canonical).await?;
    store.delete_records(&sibling_ids).await?;
    Ok(sibling_ids.len() as u32)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::testing::MemStore;

    fn record(artist: &str, title: &str) -> LocalRecord {
        let mut r = LocalRecord::blank("user-1", "default-collection");
        r.artist = artist.to_string();
        r.title = title.to_string();
        r
    }

    #[tokio::test]
    async fn counts_groups_and_removed_records() {
        // 10 records: 3 duplicate pairs + 4 singletons.
        let store = MemStore::with_records(vec![
            record("Pink Floyd", "The Wall"),
            record("pink floyd", " the wall "),
            record("Nirvana", "Nevermind"),
            record("NIRVANA", "nevermind"),
            record("Portishead", "Dummy"),
            record("portishead", "Dummy "),
            record("Can", "Tago Mago"),
            record("Faust", "Faust IV"),
            record("Neu!", "Neu!"),
            record("Cluster", "Zuckerzeit"),
        ]);

        let summary = consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        assert_eq!(summary.merged_groups, 3);
        assert_eq!(summary.removed_records, 3);
        assert_eq!(summary.errors, Vec::<String>::new());
        assert_eq!(store.snapshot().len(), 7);
    }

    #[tokio::test]
    async fn linked_record_is_canonical_and_absorbs_sibling_fields() {
        let mut a = record("Pink Floyd", "The Wall");
        a.rating = Some(5);
        let mut b = record("pink floyd", " the wall ");
        b.external_id = Some(999);

        let store = MemStore::with_records(vec![a, b.clone()]);

        let summary = consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        assert_eq!(summary.merged_groups, 1);
        assert_eq!(summary.removed_records, 1);

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, b.id);
        assert_eq!(records[0].external_id, Some(999));
        // Sibling's rating was folded in.
        assert_eq!(records[0].rating, Some(5));
    }

    #[tokio::test]
    async fn canonical_description_note_is_kept_and_never_copied() {
        let mut a = record("Can", "Tago Mago");
        a.description_note = Some("gatefold, small tear".to_string());
        let mut b = record("can", "tago mago");
        b.description_note = Some("second copy?".to_string());
        b.year = Some(1971);

        let store = MemStore::with_records(vec![a.clone(), b]);

        consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        // Both have a note; `b` also has a year, so `b` is canonical and
        // keeps its own note untouched by the fold.
        assert_eq!(records[0].description_note.as_deref(), Some("second copy?"));
        assert_eq!(records[0].year, Some(1971));
    }

    #[tokio::test]
    async fn tie_keeps_earliest_created() {
        let a = record("Faust", "Faust IV");
        let a_id = a.id.clone();
        let b = record("faust", "faust iv");

        let store = MemStore::with_records(vec![a, b]);

        consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, a_id);
    }

    #[tokio::test]
    async fn one_failing_group_does_not_block_others() {
        let mut store = MemStore::with_records(vec![
            record("Pink Floyd", "The Wall"),
            record("pink floyd", "the wall"),
            record("Nirvana", "Nevermind"),
            record("nirvana", "nevermind"),
        ]);
        // The Nirvana group's canonical update fails.
        store.fail_update_titles = vec!["Nevermind".to_string(), "nevermind".to_string()];

        let summary = consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        assert_eq!(summary.merged_groups, 1);
        assert_eq!(summary.removed_records, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].to_lowercase().contains("nirvana"));
        // Both Nirvana records are still there.
        let remaining = store.snapshot();
        assert_eq!(remaining.len(), 3);
    }

    #[tokio::test]
    async fn delete_failure_is_isolated_per_group() {
        let mut a = record("Pink Floyd", "The Wall");
        a.external_id = Some(999);
        let mut b = record("pink floyd", "the wall");
        b.rating = Some(5);

        let mut store = MemStore::with_records(vec![
            a.clone(),
            b,
            record("Nirvana", "Nevermind"),
            record("nirvana", "nevermind"),
        ]);
        store.fail_deletes = true;

        let summary = consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        // Both groups were attempted; each failed at the delete step.
        assert_eq!(summary.merged_groups, 0);
        assert_eq!(summary.removed_records, 0);
        assert_eq!(summary.errors.len(), 2);

        // Nothing was deleted, but the Pink Floyd canonical was persisted
        // before its delete failed, sibling fields folded in.
        let records = store.snapshot();
        assert_eq!(records.len(), 4);
        let canonical = records.iter().find(|r| r.id == a.id).expect("canonical");
        assert_eq!(canonical.rating, Some(5));
    }

    #[tokio::test]
    async fn dry_run_reports_without_touching_storage() {
        let store = MemStore::with_records(vec![
            record("Pink Floyd", "The Wall"),
            record("pink floyd", "the wall"),
        ]);

        let summary = consolidate_duplicates(&store, "user-1", true)
            .await
            .expect("consolidate");

        assert_eq!(summary.merged_groups, 1);
        assert_eq!(summary.removed_records, 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn genres_are_adopted_from_a_sibling() {
        // Canonical (linked) record has no genres; the sibling does.
        let mut a = record("Portishead", "Dummy");
        a.external_id = Some(123);
        let mut b = record("portishead", "dummy");
        b.genres = vec!["Trip Hop".to_string()];

        let store = MemStore::with_records(vec![a, b]);

        consolidate_duplicates(&store, "user-1", false)
            .await
            .expect("consolidate");

        let records = store.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].genres, vec!["Trip Hop"]);
    }
}
