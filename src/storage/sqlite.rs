//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingStore trait.

use crate::listing::{CanonicalListing, PropertyType};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StoredListing};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const LISTING_COLUMNS: &str = "row_id, run_id, id, source, external_id, url, title, property_type,
    location, price, size, layout, year_built, building_type, description, images, features,
    detail_incomplete, title_translated, description_translated, first_seen_at, last_seen_at,
    content_hash";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_listings(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<StoredListing>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, ListingRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(ListingRow::into_stored).collect()
    }
}

/// Column values of one listing row, before decoding
struct ListingRow {
    row_id: i64,
    run_id: Option<i64>,
    id: String,
    source: String,
    external_id: String,
    url: String,
    title: String,
    property_type: String,
    location: Option<String>,
    price: Option<i64>,
    size: Option<f64>,
    layout: Option<String>,
    year_built: Option<i32>,
    building_type: Option<String>,
    description: Option<String>,
    images: String,
    features: String,
    detail_incomplete: bool,
    title_translated: Option<String>,
    description_translated: Option<String>,
    first_seen_at: String,
    last_seen_at: String,
    content_hash: String,
}

impl ListingRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            row_id: row.get(0)?,
            run_id: row.get(1)?,
            id: row.get(2)?,
            source: row.get(3)?,
            external_id: row.get(4)?,
            url: row.get(5)?,
            title: row.get(6)?,
            property_type: row.get(7)?,
            location: row.get(8)?,
            price: row.get(9)?,
            size: row.get(10)?,
            layout: row.get(11)?,
            year_built: row.get(12)?,
            building_type: row.get(13)?,
            description: row.get(14)?,
            images: row.get(15)?,
            features: row.get(16)?,
            detail_incomplete: row.get(17)?,
            title_translated: row.get(18)?,
            description_translated: row.get(19)?,
            first_seen_at: row.get(20)?,
            last_seen_at: row.get(21)?,
            content_hash: row.get(22)?,
        })
    }

    fn into_stored(self) -> StorageResult<StoredListing> {
        let property_type = PropertyType::from_db_string(&self.property_type).ok_or_else(|| {
            StorageError::Corrupt(format!(
                "row {}: unknown property type '{}'",
                self.row_id, self.property_type
            ))
        })?;
        let images: Vec<String> = serde_json::from_str(&self.images).map_err(|e| {
            StorageError::Corrupt(format!("row {}: bad images column: {}", self.row_id, e))
        })?;
        let features: BTreeSet<String> = serde_json::from_str(&self.features).map_err(|e| {
            StorageError::Corrupt(format!("row {}: bad features column: {}", self.row_id, e))
        })?;

        Ok(StoredListing {
            row_id: self.row_id,
            run_id: self.run_id,
            listing: CanonicalListing {
                id: self.id,
                source: self.source,
                external_id: self.external_id,
                url: self.url,
                title: self.title,
                property_type,
                location: self.location,
                price: self.price,
                size: self.size,
                layout: self.layout,
                year_built: self.year_built,
                building_type: self.building_type,
                description: self.description,
                images,
                features,
                detail_incomplete: self.detail_incomplete,
                title_translated: self.title_translated,
                description_translated: self.description_translated,
                first_seen_at: parse_timestamp(self.row_id, &self.first_seen_at)?,
                last_seen_at: parse_timestamp(self.row_id, &self.last_seen_at)?,
                content_hash: self.content_hash,
            },
        })
    }
}

fn parse_timestamp(row_id: i64, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("row {}: bad timestamp '{}': {}", row_id, value, e)))
}

fn encode_lists(listing: &CanonicalListing) -> StorageResult<(String, String)> {
    let images = serde_json::to_string(&listing.images)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let features = serde_json::to_string(&listing.features)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok((images, features))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl ListingStore for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ingest_runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE ingest_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM ingest_runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM ingest_runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Listings =====

    fn latest_listing(&self, id: &str) -> StorageResult<Option<StoredListing>> {
        let sql = format!(
            "SELECT {} FROM property_listings WHERE id = ?1 ORDER BY row_id DESC LIMIT 1",
            LISTING_COLUMNS
        );
        let raw = self
            .conn
            .query_row(&sql, params![id], ListingRow::from_row)
            .optional()?;
        raw.map(ListingRow::into_stored).transpose()
    }

    fn insert_listing(
        &mut self,
        listing: &CanonicalListing,
        run_id: Option<i64>,
    ) -> StorageResult<i64> {
        let (images, features) = encode_lists(listing)?;
        self.conn.execute(
            "INSERT INTO property_listings (
                run_id, id, source, external_id, url, title, property_type, location, price,
                size, layout, year_built, building_type, description, images, features,
                detail_incomplete, title_translated, description_translated, first_seen_at,
                last_seen_at, content_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                run_id,
                listing.id,
                listing.source,
                listing.external_id,
                listing.url,
                listing.title,
                listing.property_type.as_str(),
                listing.location,
                listing.price,
                listing.size,
                listing.layout,
                listing.year_built,
                listing.building_type,
                listing.description,
                images,
                features,
                listing.detail_incomplete,
                listing.title_translated,
                listing.description_translated,
                listing.first_seen_at.to_rfc3339(),
                listing.last_seen_at.to_rfc3339(),
                listing.content_hash,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn replace_listing(
        &mut self,
        row_id: i64,
        listing: &CanonicalListing,
        run_id: Option<i64>,
    ) -> StorageResult<()> {
        let (images, features) = encode_lists(listing)?;
        let updated = self.conn.execute(
            "UPDATE property_listings SET
                run_id = ?1, id = ?2, source = ?3, external_id = ?4, url = ?5, title = ?6,
                property_type = ?7, location = ?8, price = ?9, size = ?10, layout = ?11,
                year_built = ?12, building_type = ?13, description = ?14, images = ?15,
                features = ?16, detail_incomplete = ?17, title_translated = ?18,
                description_translated = ?19, first_seen_at = ?20, last_seen_at = ?21,
                content_hash = ?22
             WHERE row_id = ?23",
            params![
                run_id,
                listing.id,
                listing.source,
                listing.external_id,
                listing.url,
                listing.title,
                listing.property_type.as_str(),
                listing.location,
                listing.price,
                listing.size,
                listing.layout,
                listing.year_built,
                listing.building_type,
                listing.description,
                images,
                features,
                listing.detail_incomplete,
                listing.title_translated,
                listing.description_translated,
                listing.first_seen_at.to_rfc3339(),
                listing.last_seen_at.to_rfc3339(),
                listing.content_hash,
                row_id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RowNotFound(row_id));
        }
        Ok(())
    }

    fn touch_listing(&mut self, row_id: i64, last_seen_at: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE property_listings SET last_seen_at = ?1 WHERE row_id = ?2",
            params![last_seen_at.to_rfc3339(), row_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RowNotFound(row_id));
        }
        Ok(())
    }

    fn listing_rows(&self, id: &str) -> StorageResult<Vec<StoredListing>> {
        let sql = format!(
            "SELECT {} FROM property_listings WHERE id = ?1 ORDER BY row_id ASC",
            LISTING_COLUMNS
        );
        self.query_listings(&sql, params![id])
    }

    fn count_listings(&self) -> StorageResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM property_listings", [], |row| row.get(0))?;
        Ok(count)
    }

    fn count_listings_by_source(&self) -> StorageResult<HashMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM property_listings GROUP BY source")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }
}
