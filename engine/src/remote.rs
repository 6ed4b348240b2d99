//! Rate-limited remote catalog reader.
//!
//! The orchestrator sees only [`RemoteCatalog`]: one page of collection
//! entries at a time, plus an optional detail lookup per release. The
//! Discogs implementation paces itself with [`Pacer`] so the aggregate call
//! rate stays under the provider limit; callers never sleep.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Instant;

use crate::config::DiscogsConfig;
use crate::error::{EngineError, Result};
use crate::model::Track;

/// Minimum gap between collection page requests (~1 req/s unauthenticated
/// Discogs limit).
const PAGE_GAP: Duration = Duration::from_millis(1000);
/// Minimum gap before each release detail request; slightly wider since
/// detail calls interleave with page calls.
const DETAIL_GAP: Duration = Duration::from_millis(1100);

const PAGE_SIZE: u32 = 50;
const USER_AGENT: &str = "wax/0.1.0 ( https://github.com/wax )";

/// One page of a user's remote collection.
#[derive(Debug, Clone)]
pub struct CollectionPage {
    pub items: Vec<RemoteEntry>,
    pub total_pages: u32,
}

/// Provider-normalized snapshot of one collection entry.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub external_id: i64,
    pub title: String,
    pub year: Option<i32>,
    /// All credited artists joined with ", ".
    pub artist: String,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub format_name: Option<String>,
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
    /// The user's own rating on the remote side, if set.
    pub rating: Option<i16>,
}

/// Richer per-release fetch; a second rate-limited round-trip.
#[derive(Debug, Clone, Default)]
pub struct ReleaseDetail {
    pub country: Option<String>,
    pub tracks: Vec<Track>,
    pub notes: Option<String>,
    pub barcodes: Vec<String>,
    pub master_id: Option<i64>,
    pub images: Vec<String>,
    pub format_descriptions: Vec<String>,
    pub community_rating: Option<f64>,
    pub data_quality: Option<String>,
}

/// Contract the sync orchestrator needs from a remote provider.
#[allow(async_fn_in_trait)]
pub trait RemoteCatalog {
    /// Fetch one page (1-based). A non-success response is an error; the
    /// orchestrator treats it as fatal to the remaining pagination.
    async fn fetch_page(&mut self, page: u32) -> Result<CollectionPage>;

    /// Fetch the detail record for one release. `Ok(None)` means the
    /// provider has no detail (404); transport errors are non-fatal to the
    /// item and are handled by the caller.
    async fn fetch_detail(&mut self, external_id: i64) -> Result<Option<ReleaseDetail>>;
}

/// Blocking/cooperative pacing between calls: `pace(gap)` suspends the
/// calling flow until at least `gap` has passed since the previous call,
/// whatever kind of call that was. One pacer covers every request to the
/// provider, so page and detail fetches are never issued back to back even
/// though they use different gaps. No retries, no background scheduler.
#[derive(Debug, Default)]
pub struct Pacer {
    last: Option<Instant>,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pace(&mut self, min_gap: Duration) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + min_gap).await;
        }
        self.last = Some(Instant::now());
    }
}

// ---------------------------------------------------------------------------
// Discogs wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    pagination: Pagination,
    #[serde(default)]
    releases: Vec<CollectionItem>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    pages: u32,
}

#[derive(Debug, Deserialize)]
struct CollectionItem {
    rating: Option<i16>,
    basic_information: BasicInformation,
}

#[derive(Debug, Deserialize)]
struct BasicInformation {
    id: i64,
    title: String,
    year: Option<i32>,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    #[serde(default)]
    labels: Vec<LabelRef>,
    #[serde(default)]
    formats: Vec<FormatRef>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    cover_image: Option<String>,
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LabelRef {
    name: String,
    catno: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatRef {
    name: String,
    #[serde(default)]
    descriptions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    country: Option<String>,
    #[serde(default)]
    tracklist: Vec<TrackRef>,
    notes: Option<String>,
    #[serde(default)]
    identifiers: Vec<IdentifierRef>,
    master_id: Option<i64>,
    #[serde(default)]
    images: Vec<ImageRef>,
    #[serde(default)]
    formats: Vec<FormatRef>,
    community: Option<Community>,
    data_quality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    position: Option<String>,
    title: String,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifierRef {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct Community {
    rating: Option<CommunityRating>,
}

#[derive(Debug, Deserialize)]
struct CommunityRating {
    average: Option<f64>,
}

// ---------------------------------------------------------------------------
// Discogs client
// ---------------------------------------------------------------------------

/// Discogs API client, paced internally.
pub struct DiscogsClient {
    http: reqwest::Client,
    token: String,
    username: String,
    base_url: String,
    pacer: Pacer,
}

impl DiscogsClient {
    pub fn new(config: &DiscogsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token: config.token.clone(),
            username: config.username.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pacer: Pacer::new(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Provider {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.json::<T>().await?)
    }
}

impl RemoteCatalog for DiscogsClient {
    async fn fetch_page(&mut self, page: u32) -> Result<CollectionPage> {
        self.pacer.pace(PAGE_GAP).await;

        // Folder 0 is "All" in the Discogs collection API.
        let url = format!(
            "{}/users/{}/collection/folders/0/releases?page={}&per_page={}",
            self.base_url,
            urlencoding::encode(&self.username),
            page,
            PAGE_SIZE
        );
        let body: CollectionResponse = self.get_json(&url).await?;

        Ok(CollectionPage {
            total_pages: body.pagination.pages,
            items: body.releases.into_iter().map(entry_from_item).collect(),
        })
    }

    async fn fetch_detail(&mut self, external_id: i64) -> Result<Option<ReleaseDetail>> {
        self.pacer.pace(DETAIL_GAP).await;

        let url = format!("{}/releases/{}", self.base_url, external_id);
        match self.get_json::<ReleaseResponse>(&url).await {
            Ok(body) => Ok(Some(detail_from_release(body))),
            Err(EngineError::Provider { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn entry_from_item(item: CollectionItem) -> RemoteEntry {
    let info = item.basic_information;
    let artist = info
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut genres = info.genres;
    genres.extend(info.styles);

    RemoteEntry {
        external_id: info.id,
        title: info.title,
        // Discogs reports 0 for an unknown year.
        year: info.year.filter(|y| *y > 0),
        artist,
        label: info.labels.first().map(|l| l.name.clone()),
        catalog_number: info
            .labels
            .first()
            .and_then(|l| l.catno.clone())
            .filter(|c| !c.is_empty() && c != "none"),
        format_name: info.formats.first().map(|f| f.name.clone()),
        genres,
        cover_url: info.cover_image.or(info.thumb).filter(|u| !u.is_empty()),
        rating: item.rating.filter(|r| *r > 0),
    }
}

fn detail_from_release(body: ReleaseResponse) -> ReleaseDetail {
    ReleaseDetail {
        country: body.country,
        tracks: body
            .tracklist
            .into_iter()
            .map(|t| Track {
                position: t.position.filter(|p| !p.is_empty()),
                title: t.title,
                duration: t.duration.filter(|d| !d.is_empty()),
            })
            .collect(),
        notes: body.notes,
        barcodes: body
            .identifiers
            .into_iter()
            .filter(|i| i.kind == "Barcode")
            .map(|i| i.value)
            .collect(),
        master_id: body.master_id,
        images: body.images.into_iter().map(|i| i.uri).collect(),
        format_descriptions: body
            .formats
            .into_iter()
            .flat_map(|f| f.descriptions)
            .collect(),
        community_rating: body.community.and_then(|c| c.rating).and_then(|r| r.average),
        data_quality: body.data_quality,
    }
}
