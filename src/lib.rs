//! JapanHouse ingest: a multi-source property-listing ingestion pipeline
//!
//! This crate crawls paginated listing pages (and optionally detail pages) of
//! several Japanese real-estate sites, normalizes their heterogeneous fields
//! into one canonical schema, and reconciles the result against a SQLite
//! store through an idempotent upsert.

pub mod adapters;
pub mod config;
pub mod crawler;
pub mod ingest;
pub mod listing;
pub mod normalize;
pub mod storage;
pub mod translate;

use thiserror::Error;

/// Main error type for ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Unknown scraper '{name}' (available: {available})")]
    UnknownAdapter { name: String, available: String },

    #[error("Invalid base URL for {adapter}: {source}")]
    InvalidBaseUrl {
        adapter: String,
        source: ::url::ParseError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while fetching a single page over the network
///
/// Only the transient variants are worth another attempt; everything else
/// is final for the page or listing that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Blocked by source (HTTP {status}) at {url}")]
    Blocked { url: String, status: u16 },

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Timeouts, connection failures, 408/429 and 5xx responses
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Sustained failure of one source (outage, block, or structural change)
///
/// Aborts only the adapter it was raised for.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{adapter} aborted: {reason}")]
pub struct FatalAdapterError {
    pub adapter: String,
    pub reason: String,
}

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapters::{build_adapter, available_adapters, SiteAdapter};
pub use config::Config;
pub use ingest::{Orchestrator, RunOptions, RunSummary};
pub use listing::{CanonicalListing, DetailRecord, PropertyType, RawListingStub};
