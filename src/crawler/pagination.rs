//! Bounded crawl of one adapter's listing pages

use crate::adapters::{SearchQuery, SiteAdapter};
use crate::crawler::SiteSession;
use crate::listing::RawListingStub;
use crate::{FatalAdapterError, FetchError};
use std::collections::HashSet;
use tracing::{info, warn};

/// Bounds for one adapter crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Last page number to request
    pub max_pages: u32,

    /// Stop as soon as this many unique stubs are retained
    pub max_listings: Option<usize>,

    /// Consecutive failed pages that abort the adapter
    pub max_consecutive_failures: u32,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 5,
            max_listings: None,
            max_consecutive_failures: 3,
        }
    }
}

impl CrawlLimits {
    fn listing_cap_reached(&self, retained: usize) -> bool {
        self.max_listings.is_some_and(|max| retained >= max)
    }
}

/// Everything a crawl produced, including what went wrong
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Unique stubs in discovery order
    pub stubs: Vec<RawListingStub>,

    /// Listing pages whose body was received
    pub pages_fetched: u32,

    /// One entry per page that was skipped
    pub page_errors: Vec<String>,

    /// Listing cards that could not be parsed
    pub item_errors: usize,

    /// Stubs dropped because their id was already retained in this crawl
    pub duplicates: usize,

    pub fatal: Option<FatalAdapterError>,

    pub cancelled: bool,
}

/// Drives one adapter across pages `1..=max_pages`
pub struct PaginationCrawler<'a> {
    adapter: &'a dyn SiteAdapter,
    limits: CrawlLimits,
}

impl<'a> PaginationCrawler<'a> {
    pub fn new(adapter: &'a dyn SiteAdapter, limits: CrawlLimits) -> Self {
        Self { adapter, limits }
    }

    /// Crawls listing pages until a stop condition is met
    ///
    /// Stops when the listing cap is reached (checked after every stub), the
    /// adapter reports no next page, `max_pages` is exhausted, the run is
    /// cancelled, or the adapter is declared dead. Dead means: a blocking
    /// response (401/403), `max_consecutive_failures` failed pages in a row,
    /// or no successful page at all.
    pub async fn crawl(&self, session: &mut SiteSession, query: &SearchQuery) -> CrawlOutcome {
        let name = self.adapter.name();
        let mut outcome = CrawlOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut consecutive_failures = 0u32;
        let mut attempted = 0u32;
        let mut succeeded = 0u32;

        for page_number in 1..=self.limits.max_pages {
            if self.limits.listing_cap_reached(outcome.stubs.len()) {
                break;
            }
            if session.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let url = match self.adapter.listing_page_url(query, page_number) {
                Ok(url) => url,
                Err(e) => {
                    outcome.fatal = Some(fatal(name, format!("cannot build page URL: {}", e)));
                    break;
                }
            };

            attempted += 1;
            info!(adapter = name, page = page_number, url = %url, "fetching listing page");

            let failure = match session.get(&url).await {
                Err(FetchError::Cancelled) => {
                    outcome.cancelled = true;
                    break;
                }
                Err(e @ FetchError::Blocked { .. }) => {
                    outcome.page_errors.push(format!("page {}: {}", page_number, e));
                    outcome.fatal = Some(fatal(name, e.to_string()));
                    break;
                }
                Err(e) => Some(format!("page {}: {}", page_number, e)),
                Ok(html) => {
                    outcome.pages_fetched += 1;
                    match self.adapter.parse_listing_page(&html, query) {
                        Err(e) => Some(format!("page {}: {}", page_number, e)),
                        Ok(page) => {
                            consecutive_failures = 0;
                            succeeded += 1;

                            for reason in &page.item_errors {
                                warn!(adapter = name, page = page_number, "skipped listing: {}", reason);
                            }
                            outcome.item_errors += page.item_errors.len();

                            for stub in page.stubs {
                                if !seen.insert(stub.id()) {
                                    outcome.duplicates += 1;
                                    continue;
                                }
                                outcome.stubs.push(stub);
                                if self.limits.listing_cap_reached(outcome.stubs.len()) {
                                    break;
                                }
                            }

                            info!(
                                adapter = name,
                                page = page_number,
                                retained = outcome.stubs.len(),
                                "listing page parsed"
                            );

                            if !page.has_next {
                                break;
                            }
                            None
                        }
                    }
                }
            };

            if let Some(reason) = failure {
                warn!(adapter = name, "skipping {}", reason);
                outcome.page_errors.push(reason);
                consecutive_failures += 1;

                if consecutive_failures >= self.limits.max_consecutive_failures {
                    outcome.fatal = Some(fatal(
                        name,
                        format!("{} consecutive page failures", consecutive_failures),
                    ));
                    break;
                }
            }
        }

        if outcome.fatal.is_none() && !outcome.cancelled && attempted > 0 && succeeded == 0 {
            outcome.fatal = Some(fatal(
                name,
                format!("all {} attempted pages failed", attempted),
            ));
        }

        outcome
    }
}

fn fatal(adapter: &str, reason: String) -> FatalAdapterError {
    FatalAdapterError {
        adapter: adapter.to_string(),
        reason,
    }
}
