//! Storage traits and error types
//!
//! This module defines the trait interface for listing stores and
//! associated error types.

use crate::listing::CanonicalListing;
use crate::storage::{RunRecord, RunStatus, StoredListing};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Listing row not found: {0}")]
    RowNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Keyed store of listings plus the ingest-run log
///
/// Listings are keyed by their stable id; a single id may own several rows
/// (append mode), and reads by id return the most recent one.
pub trait ListingStore {
    // ===== Run Management =====

    /// Creates a new ingest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration the run uses
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the final status and finish time of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Listings =====

    /// Latest stored row for a listing id
    fn latest_listing(&self, id: &str) -> StorageResult<Option<StoredListing>>;

    /// Inserts a new row and returns its row id
    fn insert_listing(
        &mut self,
        listing: &CanonicalListing,
        run_id: Option<i64>,
    ) -> StorageResult<i64>;

    /// Overwrites every column of an existing row
    fn replace_listing(
        &mut self,
        row_id: i64,
        listing: &CanonicalListing,
        run_id: Option<i64>,
    ) -> StorageResult<()>;

    /// Updates only `last_seen_at` of an existing row
    fn touch_listing(&mut self, row_id: i64, last_seen_at: DateTime<Utc>) -> StorageResult<()>;

    /// Every row stored for a listing id, oldest first
    fn listing_rows(&self, id: &str) -> StorageResult<Vec<StoredListing>>;

    /// Total number of listing rows
    fn count_listings(&self) -> StorageResult<i64>;

    /// Listing rows per source
    fn count_listings_by_source(&self) -> StorageResult<HashMap<String, i64>>;
}
