//! Crawler module for fetching listing and detail pages
//!
//! This module contains the network-facing half of the pipeline:
//! - HTTP fetching with status classification
//! - Bounded exponential-backoff retries
//! - Per-source request spacing
//! - Bounded pagination over one adapter's listing pages
//! - The optional detail-page pass

mod detail;
mod fetcher;
mod pagination;
mod retry;
mod throttle;

pub use detail::{DetailFetcher, DetailOutcome};
pub use fetcher::{build_http_client, classify_status, fetch_page, SiteSession};
pub use pagination::{CrawlLimits, CrawlOutcome, PaginationCrawler};
pub use retry::RetryPolicy;
pub use throttle::Throttle;
