//! Catalog storage.
//!
//! [`CatalogStore`] is the contract the engine needs from relational
//! storage; [`PgStore`] implements it against PostgreSQL with the schema in
//! `schema.sql` (Prisma-style quoted camelCase identifiers, cuid primary
//! keys). Tests use the in-memory store in [`testing`].

use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::error::Result;
use crate::model::LocalRecord;

/// Storage operations used by the sync and consolidation engines.
#[allow(async_fn_in_trait)]
pub trait CatalogStore {
    /// Id of the owner's default collection, creating it when absent.
    async fn ensure_default_collection(&self, owner: &str) -> Result<String>;

    async fn find_by_external_id(
        &self,
        owner: &str,
        external_id: i64,
    ) -> Result<Option<LocalRecord>>;

    /// Records owned by `owner` with no external id whose artist contains
    /// `artist_fragment` and whose title contains `title_fragment`, both
    /// case-insensitive, ordered by creation time ascending.
    async fn fuzzy_candidates(
        &self,
        owner: &str,
        artist_fragment: &str,
        title_fragment: &str,
    ) -> Result<Vec<LocalRecord>>;

    async fn insert_record(&self, record: &LocalRecord) -> Result<()>;

    async fn update_record(&self, record: &LocalRecord) -> Result<()>;

    /// All records for `owner`, ordered by creation time ascending. The
    /// consolidation engine's canonical tie-break relies on this ordering.
    async fn load_records(&self, owner: &str) -> Result<Vec<LocalRecord>>;

    async fn delete_records(&self, ids: &[String]) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

const RECORD_COLUMNS: &str = r#"id, "ownerId", "collectionId", "externalId", artist, title,
    year, "imageUrl", genres, label, "formatName", "catalogNumber", country,
    "trackList", "descriptionNote", rating, "purchaseDate", "purchasePrice",
    "purchaseCurrency", "purchaseLocation", "createdAt", "updatedAt""#;

#[derive(FromRow)]
struct RecordRow {
    id: String,
    #[sqlx(rename = "ownerId")]
    owner: String,
    #[sqlx(rename = "collectionId")]
    collection_id: Option<String>,
    #[sqlx(rename = "externalId")]
    external_id: Option<i64>,
    artist: String,
    title: String,
    year: Option<i32>,
    #[sqlx(rename = "imageUrl")]
    image_url: Option<String>,
    genres: Option<String>,
    label: Option<String>,
    #[sqlx(rename = "formatName")]
    format_name: Option<String>,
    #[sqlx(rename = "catalogNumber")]
    catalog_number: Option<String>,
    country: Option<String>,
    #[sqlx(rename = "trackList")]
    track_list: Option<String>,
    #[sqlx(rename = "descriptionNote")]
    description_note: Option<String>,
    rating: Option<i16>,
    #[sqlx(rename = "purchaseDate")]
    purchase_date: Option<chrono::NaiveDate>,
    #[sqlx(rename = "purchasePrice")]
    purchase_price: Option<f64>,
    #[sqlx(rename = "purchaseCurrency")]
    purchase_currency: Option<String>,
    #[sqlx(rename = "purchaseLocation")]
    purchase_location: Option<String>,
    #[sqlx(rename = "createdAt")]
    created_at: chrono::NaiveDateTime,
    #[sqlx(rename = "updatedAt")]
    updated_at: chrono::NaiveDateTime,
}

impl From<RecordRow> for LocalRecord {
    fn from(row: RecordRow) -> Self {
        LocalRecord {
            id: row.id,
            owner: row.owner,
            collection_id: row.collection_id,
            external_id: row.external_id,
            artist: row.artist,
            title: row.title,
            year: row.year,
            image_url: row.image_url,
            genres: row
                .genres
                .as_deref()
                .and_then(|g| serde_json::from_str(g).ok())
                .unwrap_or_default(),
            label: row.label,
            format_name: row.format_name,
            catalog_number: row.catalog_number,
            country: row.country,
            tracks: row
                .track_list
                .as_deref()
                .and_then(|t| serde_json::from_str(t).ok())
                .unwrap_or_default(),
            description_note: row.description_note,
            rating: row.rating,
            purchase_date: row.purchase_date,
            purchase_price: row.purchase_price,
            purchase_currency: row.purchase_currency,
            purchase_location: row.purchase_location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape LIKE wildcards in user-derived fragments.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    fn genres_blob(record: &LocalRecord) -> Result<String> {
        Ok(serde_json::to_string(&record.genres)?)
    }

    fn tracks_blob(record: &LocalRecord) -> Result<Option<String>> {
        if record.tracks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::to_string(&record.tracks)?))
        }
    }
}

impl CatalogStore for PgStore {
    async fn ensure_default_collection(&self, owner: &str) -> Result<String> {
        let existing: Option<(String,)> = sqlx::query_as(
            r#"SELECT id FROM "Collection" WHERE "ownerId" = $1 AND "isDefault" = TRUE LIMIT 1"#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id,)) = existing {
            return Ok(id);
        }

        let id = cuid2::create_id();
        sqlx::query(
            r#"INSERT INTO "Collection" (id, "ownerId", name, "isDefault", "createdAt", "updatedAt")
               VALUES ($1, $2, 'Collection', TRUE, NOW(), NOW())"#,
        )
        .bind(&id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_external_id(
        &self,
        owner: &str,
        external_id: i64,
    ) -> Result<Option<LocalRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM "Record"
               WHERE "ownerId" = $1 AND "externalId" = $2 LIMIT 1"#
        ))
        .bind(owner)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LocalRecord::from))
    }

    async fn fuzzy_candidates(
        &self,
        owner: &str,
        artist_fragment: &str,
        title_fragment: &str,
    ) -> Result<Vec<LocalRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM "Record"
               WHERE "ownerId" = $1
                 AND "externalId" IS NULL
                 AND artist ILIKE '%' || $2 || '%'
                 AND title ILIKE '%' || $3 || '%'
               ORDER BY "createdAt" ASC"#
        ))
        .bind(owner)
        .bind(escape_like(artist_fragment))
        .bind(escape_like(title_fragment))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LocalRecord::from).collect())
    }

    async fn insert_record(&self, record: &LocalRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO "Record"
               (id, "ownerId", "collectionId", "externalId", artist, title, year,
                "imageUrl", genres, label, "formatName", "catalogNumber", country,
                "trackList", "descriptionNote", rating, "purchaseDate", "purchasePrice",
                "purchaseCurrency", "purchaseLocation", "createdAt", "updatedAt")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                       $14, $15, $16, $17, $18, $19, $20, $21, $21)"#,
        )
        .bind(&record.id)
        .bind(&record.owner)
        .bind(&record.collection_id)
        .bind(record.external_id)
        .bind(&record.artist)
        .bind(&record.title)
        .bind(record.year)
        .bind(&record.image_url)
        .bind(Self::genres_blob(record)?)
        .bind(&record.label)
        .bind(&record.format_name)
        .bind(&record.catalog_number)
        .bind(&record.country)
        .bind(Self::tracks_blob(record)?)
        .bind(&record.description_note)
        .bind(record.rating)
        .bind(record.purchase_date)
        .bind(record.purchase_price)
        .bind(&record.purchase_currency)
        .bind(&record.purchase_location)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_record(&self, record: &LocalRecord) -> Result<()> {
        sqlx::query(
            r#"UPDATE "Record" SET
                 "externalId" = $1, artist = $2, title = $3, year = $4,
                 "imageUrl" = $5, genres = $6, label = $7, "formatName" = $8,
                 "catalogNumber" = $9, country = $10, "trackList" = $11,
                 rating = $12, "purchaseDate" = $13, "purchasePrice" = $14,
                 "purchaseCurrency" = $15, "purchaseLocation" = $16,
                 "updatedAt" = NOW()
               WHERE id = $17"#,
        )
        .bind(record.external_id)
        .bind(&record.artist)
        .bind(&record.title)
        .bind(record.year)
        .bind(&record.image_url)
        .bind(Self::genres_blob(record)?)
        .bind(&record.label)
        .bind(&record.format_name)
        .bind(&record.catalog_number)
        .bind(&record.country)
        .bind(Self::tracks_blob(record)?)
        .bind(record.rating)
        .bind(record.purchase_date)
        .bind(record.purchase_price)
        .bind(&record.purchase_currency)
        .bind(&record.purchase_location)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_records(&self, owner: &str) -> Result<Vec<LocalRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            r#"SELECT {RECORD_COLUMNS} FROM "Record"
               WHERE "ownerId" = $1 ORDER BY "createdAt" ASC"#
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LocalRecord::from).collect())
    }

    async fn delete_records(&self, ids: &[String]) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM "Record" WHERE id = ANY($1)"#)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory store for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::CatalogStore;
    use crate::error::{EngineError, Result};
    use crate::model::LocalRecord;

    /// Mirrors the SQL semantics of [`super::PgStore`] over a `Vec`.
    /// Insertion order stands in for `createdAt` ordering.
    #[derive(Default)]
    pub struct MemStore {
        pub records: Mutex<Vec<LocalRecord>>,
        /// Titles whose update should fail, to exercise error isolation.
        pub fail_update_titles: Vec<String>,
        pub fail_deletes: bool,
    }

    impl MemStore {
        pub fn with_records(records: Vec<LocalRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                ..Self::default()
            }
        }

        pub fn snapshot(&self) -> Vec<LocalRecord> {
            self.records.lock().expect("lock").clone()
        }
    }

    impl CatalogStore for MemStore {
        async fn ensure_default_collection(&self, _owner: &str) -> Result<String> {
            Ok("default-collection".to_string())
        }

        async fn find_by_external_id(
            &self,
            owner: &str,
            external_id: i64,
        ) -> Result<Option<LocalRecord>> {
            Ok(self
                .records
                .lock()
                .expect("lock")
                .iter()
                .find(|r| r.owner == owner && r.external_id == Some(external_id))
                .cloned())
        }

        async fn fuzzy_candidates(
            &self,
            owner: &str,
            artist_fragment: &str,
            title_fragment: &str,
        ) -> Result<Vec<LocalRecord>> {
            let artist = artist_fragment.to_lowercase();
            let title = title_fragment.to_lowercase();
            Ok(self
                .records
                .lock()
                .expect("lock")
                .iter()
                .filter(|r| {
                    r.owner == owner
                        && r.external_id.is_none()
                        && r.artist.to_lowercase().contains(&artist)
                        && r.title.to_lowercase().contains(&title)
                })
                .cloned()
                .collect())
        }

        async fn insert_record(&self, record: &LocalRecord) -> Result<()> {
            self.records.lock().expect("lock").push(record.clone());
            Ok(())
        }

        async fn update_record(&self, record: &LocalRecord) -> Result<()> {
            if self.fail_update_titles.contains(&record.title) {
                return Err(EngineError::Storage(format!(
                    "simulated update failure for '{}'",
                    record.title
                )));
            }
            let mut records = self.records.lock().expect("lock");
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => {
                    *slot = record.clone();
                    Ok(())
                }
                None => Err(EngineError::Storage(format!(
                    "no record with id {}",
                    record.id
                ))),
            }
        }

        async fn load_records(&self, owner: &str) -> Result<Vec<LocalRecord>> {
            let mut records: Vec<LocalRecord> = self
                .records
                .lock()
                .expect("lock")
                .iter()
                .filter(|r| r.owner == owner)
                .cloned()
                .collect();
            records.sort_by_key(|r| r.created_at);
            Ok(records)
        }

        async fn delete_records(&self, ids: &[String]) -> Result<u64> {
            if self.fail_deletes {
                return Err(EngineError::Storage("simulated delete failure".to_string()));
            }
            let mut records = self.records.lock().expect("lock");
            let before = records.len();
            records.retain(|r| !ids.contains(&r.id));
            Ok((before - records.len()) as u64)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("100% Dynamite"), "100\\% Dynamite");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }
}
