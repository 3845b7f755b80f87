//! Optional detail-page pass

use crate::adapters::SiteAdapter;
use crate::crawler::SiteSession;
use crate::listing::{DetailRecord, RawListingStub};
use crate::FetchError;
use tracing::{debug, warn};

/// Result of enriching one stub
#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Fetched(DetailRecord),

    /// The detail page could not be used; the listing continues with stub
    /// fields only
    Incomplete(String),

    Cancelled,
}

/// Fetches and parses detail pages through the adapter's session
///
/// Shares the adapter's throttle and retry policy with the listing crawl,
/// so detail requests count against the same rate limit.
pub struct DetailFetcher<'a> {
    adapter: &'a dyn SiteAdapter,
}

impl<'a> DetailFetcher<'a> {
    pub fn new(adapter: &'a dyn SiteAdapter) -> Self {
        Self { adapter }
    }

    pub async fn fetch(&self, session: &mut SiteSession, stub: &RawListingStub) -> DetailOutcome {
        let Some(url) = self.adapter.detail_page_url(stub) else {
            return self.incomplete(stub, "no detail page URL".to_string());
        };

        let html = match session.get(&url).await {
            Ok(html) => html,
            Err(FetchError::Cancelled) => return DetailOutcome::Cancelled,
            Err(e) => return self.incomplete(stub, e.to_string()),
        };

        match self.adapter.parse_detail_page(&html, stub) {
            Ok(record) => {
                debug!(
                    adapter = self.adapter.name(),
                    external_id = %stub.external_id,
                    images = record.images.len(),
                    "detail page parsed"
                );
                DetailOutcome::Fetched(record)
            }
            Err(e) => self.incomplete(stub, e.to_string()),
        }
    }

    fn incomplete(&self, stub: &RawListingStub, reason: String) -> DetailOutcome {
        warn!(
            adapter = self.adapter.name(),
            external_id = %stub.external_id,
            "detail page unavailable, keeping listing-page fields: {}",
            reason
        );
        DetailOutcome::Incomplete(reason)
    }
}
