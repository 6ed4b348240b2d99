//! Sync orchestrator.
//!
//! Drives the rate-limited reader page by page, resolves each remote entry
//! against the local catalog, and creates or fills in records. One malformed
//! entry never aborts the run: its error lands in the summary and the loop
//! moves on. A failed page fetch ends pagination early but the summary
//! accumulated so far is still returned.

use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::matching::resolve;
use crate::merge::merge;
use crate::model::{LocalRecord, RecordPatch, SyncSummary};
use crate::remote::{ReleaseDetail, RemoteCatalog, RemoteEntry};
use crate::store::CatalogStore;

/// Mirror the owner's remote collection into the local catalog.
pub async fn sync_collection<R, S>(remote: &mut R, store: &S, owner: &str) -> Result<SyncSummary>
where
    R: RemoteCatalog,
    S: CatalogStore,
{
    sync_collection_limited(remote, store, owner, None).await
}

/// Like [`sync_collection`], but stops after `max_pages` pages when given.
pub async fn sync_collection_limited<R, S>(
    remote: &mut R,
    store: &S,
    owner: &str,
    max_pages: Option<u32>,
) -> Result<SyncSummary>
where
    R: RemoteCatalog,
    S: CatalogStore,
{
    if owner.trim().is_empty() {
        return Err(EngineError::Precondition("no owner given".to_string()));
    }

    let collection_id = store.ensure_default_collection(owner).await?;
    let mut summary = SyncSummary::default();
    let mut page = 1u32;

    loop {
        let fetched = match remote.fetch_page(page).await {
            Ok(p) => p,
            Err(e) => {
                // Fatal to the remaining pagination only; partial counts
                // are still reported.
                warn!(page, error = %e, "page fetch failed, stopping pagination");
                summary.push_error(format!("page {}: {}", page, e));
                break;
            }
        };
        summary.pages += 1;
        info!(
            page,
            total_pages = fetched.total_pages,
            items = fetched.items.len(),
            "processing collection page"
        );

        for entry in &fetched.items {
            if let Err(e) = sync_entry(remote, store, owner, &collection_id, entry, &mut summary)
                .await
            {
                warn!(release = entry.external_id, error = %e, "entry failed");
                summary.failed += 1;
                summary.push_error(format!("{} - {}: {}", entry.artist, entry.title, e));
            }
        }

        if page >= fetched.total_pages {
            break;
        }
        if let Some(limit) = max_pages {
            if page >= limit {
                info!(limit, "page limit reached, stopping early");
                break;
            }
        }
        page += 1;
    }

    Ok(summary)
}

async fn sync_entry<R, S>(
    remote: &mut R,
    store: &S,
    owner: &str,
    collection_id: &str,
    entry: &RemoteEntry,
    summary: &mut SyncSummary,
) -> Result<()>
where
    R: RemoteCatalog,
    S: CatalogStore,
{
    // Best effort: a failed detail fetch degrades the entry to page data.
    // The failure is still recorded in the run's error list; the item is
    // not counted as failed because it proceeds through the pipeline.
    let detail = match remote.fetch_detail(entry.external_id).await {
        Ok(d) => d,
        Err(e) => {
            warn!(release = entry.external_id, error = %e, "detail fetch failed, continuing without");
            summary.push_error(format!(
                "{} - {}: detail fetch: {}",
                entry.artist, entry.title, e
            ));
            None
        }
    };

    match resolve(store, owner, entry).await? {
        // Already linked to the remote catalog: nothing to do.
        Some(existing) if existing.external_id.is_some() => {
            summary.skipped += 1;
        }
        // Manually entered record seen remotely for the first time: attach
        // the external id and fill its gaps.
        Some(existing) => {
            let merged = merge(&existing, &patch_from_remote(entry, detail.as_ref()));
            store.update_record(&merged).await?;
            summary.updated += 1;
        }
        None => {
            let record = new_record(owner, collection_id, entry, detail.as_ref());
            store.insert_record(&record).await?;
            summary.created += 1;
        }
    }

    Ok(())
}

/// Mergeable fields of a remote entry plus its optional detail record.
fn patch_from_remote(entry: &RemoteEntry, detail: Option<&ReleaseDetail>) -> RecordPatch {
    RecordPatch {
        external_id: Some(entry.external_id),
        artist: Some(entry.artist.clone()).filter(|a| !a.is_empty()),
        title: Some(entry.title.clone()).filter(|t| !t.is_empty()),
        year: entry.year,
        image_url: entry
            .cover_url
            .clone()
            .or_else(|| detail.and_then(|d| d.images.first().cloned())),
        genres: entry.genres.clone(),
        label: entry.label.clone(),
        format_name: entry.format_name.clone(),
        catalog_number: entry.catalog_number.clone(),
        country: detail.and_then(|d| d.country.clone()),
        tracks: detail.map(|d| d.tracks.clone()).unwrap_or_default(),
        rating: entry.rating,
        ..Default::default()
    }
}

fn new_record(
    owner: &str,
    collection_id: &str,
    entry: &RemoteEntry,
    detail: Option<&ReleaseDetail>,
) -> LocalRecord {
    merge(
        &LocalRecord::blank(owner, collection_id),
        &patch_from_remote(entry, detail),
    )
}
