//! Run orchestration
//!
//! The orchestrator resolves adapter names, runs one worker per adapter on a
//! bounded pool, and folds the per-adapter reports into a [`RunSummary`].
//! A worker that fails fatally only ends its own adapter.

use crate::adapters::{available_adapters, build_adapter, SearchQuery, SiteAdapter};
use crate::config::Config;
use crate::crawler::{
    build_http_client, CrawlLimits, DetailFetcher, DetailOutcome, PaginationCrawler,
    RetryPolicy, SiteSession, Throttle,
};
use crate::ingest::{AdapterReport, AdapterStatus, RunSummary, Upserter};
use crate::listing::{CanonicalListing, PropertyType};
use crate::normalize::{ImagePolicy, Normalized, Normalizer};
use crate::storage::{ListingStore, RunStatus, SqliteStorage, StorageError};
use crate::translate::Translator;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Per-invocation run parameters
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Adapter names to run; empty selects every registered adapter
    pub scrapers: Vec<String>,
    pub location: String,
    pub property_type: PropertyType,
    pub max_pages: u32,
    pub max_listings: Option<usize>,
    pub update_mode: bool,
    pub detail_pages: bool,
    pub enforce_image_quality: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            scrapers: Vec::new(),
            location: "tokyo".to_string(),
            property_type: PropertyType::Rent,
            max_pages: 5,
            max_listings: None,
            update_mode: false,
            detail_pages: false,
            enforce_image_quality: false,
        }
    }
}

/// Runs selected adapters end to end against one store
pub struct Orchestrator {
    config: Config,
    config_hash: String,
    store: Arc<Mutex<SqliteStorage>>,
    translator: Option<Arc<dyn Translator>>,
}

impl Orchestrator {
    /// Opens the store named by `config.output.database_path`
    ///
    /// # Arguments
    ///
    /// * `config` - Pipeline configuration
    /// * `config_hash` - Recorded with every run started by this orchestrator
    pub fn new(config: Config, config_hash: impl Into<String>) -> crate::Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Ok(Self {
            config,
            config_hash: config_hash.into(),
            store: Arc::new(Mutex::new(storage)),
            translator: None,
        })
    }

    /// Translates titles and descriptions before they are stored
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Resolves adapter names, in the order given, without duplicates
    ///
    /// An empty list selects every registered adapter. Configured base URL
    /// overrides are applied here.
    pub fn select_adapters(&self, names: &[String]) -> crate::Result<Vec<Box<dyn SiteAdapter>>> {
        let wanted: Vec<String> = if names.is_empty() {
            available_adapters().into_iter().map(str::to_string).collect()
        } else {
            names.iter().map(|name| name.trim().to_lowercase()).collect()
        };

        let mut seen = HashSet::new();
        let mut adapters = Vec::new();
        for name in wanted {
            if name.is_empty() || !seen.insert(name.clone()) {
                continue;
            }
            adapters.push(build_adapter(&name, self.config.site_base_url(&name))?);
        }
        Ok(adapters)
    }

    /// Runs every selected adapter and records the run
    ///
    /// Returns an error only for problems that prevent the run from
    /// starting (unknown adapter, store or client setup). Adapter failures
    /// are reported in the summary.
    pub async fn run(
        &self,
        options: &RunOptions,
        cancel: CancellationToken,
    ) -> crate::Result<RunSummary> {
        let adapters = self.select_adapters(&options.scrapers)?;
        let names: Vec<String> = adapters.iter().map(|a| a.name().to_string()).collect();
        let client = build_http_client(
            &self.config.user_agent,
            Duration::from_secs(self.config.crawler.request_timeout_secs),
        )?;

        let run_id = self.lock_store()?.create_run(&self.config_hash)?;
        let started_at = Utc::now();
        info!(
            run_id,
            adapters = %names.join(","),
            location = %options.location,
            property_type = %options.property_type,
            update_mode = options.update_mode,
            "starting ingest run"
        );

        let worker = Worker {
            client,
            interval: Duration::from_millis(self.config.crawler.min_request_interval_ms),
            retry: RetryPolicy::from_config(&self.config.retry),
            limits: CrawlLimits {
                max_pages: options.max_pages,
                max_listings: options.max_listings,
                max_consecutive_failures: self.config.crawler.max_consecutive_page_failures,
            },
            query: SearchQuery::new(&options.location, options.property_type),
            detail_pages: options.detail_pages,
            normalizer: Normalizer::new(ImagePolicy::new(
                options.enforce_image_quality,
                &self.config.images,
            )),
            upserter: Upserter::new(Arc::clone(&self.store), options.update_mode, Some(run_id)),
            translator: self.translator.clone(),
            cancel: cancel.clone(),
        };

        let permits = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_adapters.max(1) as usize,
        ));
        let mut workers = JoinSet::new();

        for adapter in adapters {
            let worker = worker.clone();
            let permits = Arc::clone(&permits);
            let span = info_span!("adapter", name = adapter.name());

            workers.spawn(
                async move {
                    let _permit = tokio::select! {
                        _ = worker.cancel.cancelled() => {
                            return worker.cancelled_report(adapter.as_ref());
                        }
                        permit = permits.acquire_owned() => permit,
                    };
                    worker.run(adapter.as_ref()).await
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("adapter worker aborted: {}", e),
            }
        }

        for name in &names {
            if !reports.iter().any(|report| &report.name == name) {
                let mut report = AdapterReport::new(name.clone());
                report.status = AdapterStatus::Failed("worker aborted".to_string());
                reports.push(report);
            }
        }
        reports.sort_by_key(|report| names.iter().position(|name| name == &report.name));

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            reports,
        };

        let status = if summary.is_success() {
            RunStatus::Completed
        } else if cancel.is_cancelled() {
            RunStatus::Interrupted
        } else {
            RunStatus::Failed
        };
        self.lock_store()?.finish_run(run_id, status)?;

        info!(
            run_id,
            status = status.to_db_string(),
            written = summary.total_written(),
            "ingest run finished"
        );
        Ok(summary)
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, SqliteStorage>, StorageError> {
        self.store.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

/// Everything one adapter worker needs, cloned per adapter
#[derive(Clone)]
struct Worker {
    client: Client,
    interval: Duration,
    retry: RetryPolicy,
    limits: CrawlLimits,
    query: SearchQuery,
    detail_pages: bool,
    normalizer: Normalizer,
    upserter: Upserter<SqliteStorage>,
    translator: Option<Arc<dyn Translator>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(&self, adapter: &dyn SiteAdapter) -> AdapterReport {
        let name = adapter.name();
        let mut report = AdapterReport::new(name);
        let mut session = SiteSession::new(
            self.client.clone(),
            Throttle::new(self.interval),
            self.retry.clone(),
            self.cancel.clone(),
        );

        info!(adapter = name, base_url = %adapter.base_url(), "adapter started");
        let crawl = PaginationCrawler::new(adapter, self.limits.clone())
            .crawl(&mut session, &self.query)
            .await;

        report.pages_fetched = crawl.pages_fetched;
        report.stubs_retained = crawl.stubs.len();
        report.duplicates = crawl.duplicates;
        report.errored = crawl.item_errors + crawl.page_errors.len();
        report.page_errors = crawl.page_errors;

        let detail = DetailFetcher::new(adapter);
        let mut cancelled = crawl.cancelled;

        // Stubs retained before a fatal error are still persisted
        for stub in crawl.stubs {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let (record, incomplete) = if self.detail_pages {
                match detail.fetch(&mut session, &stub).await {
                    DetailOutcome::Fetched(record) => (Some(record), false),
                    DetailOutcome::Incomplete(_) => (None, true),
                    DetailOutcome::Cancelled => {
                        cancelled = true;
                        break;
                    }
                }
            } else {
                (None, false)
            };

            let mut listing = match self.normalizer.normalize(stub, record, incomplete, Utc::now()) {
                Normalized::Listing(listing) => *listing,
                Normalized::Skipped(skip) => {
                    warn!(
                        adapter = name,
                        external_id = %skip.external_id,
                        "skipped listing: {}",
                        skip.reason
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            if incomplete {
                report.detail_incomplete += 1;
            }

            self.translate(&mut listing).await;

            match self.upserter.upsert(listing) {
                Ok(action) => {
                    debug!(adapter = name, ?action, "listing stored");
                    report.record(action);
                }
                Err(e) => {
                    error!(adapter = name, "failed to store listing: {}", e);
                    report.errored += 1;
                }
            }
        }

        report.status = match crawl.fatal {
            Some(fatal) => {
                error!(adapter = name, "{}", fatal);
                AdapterStatus::Failed(fatal.reason)
            }
            None if cancelled => {
                warn!(adapter = name, "adapter cancelled");
                AdapterStatus::Cancelled
            }
            None => AdapterStatus::Completed,
        };

        info!(
            adapter = name,
            status = ?report.status,
            pages = report.pages_fetched,
            stubs = report.stubs_retained,
            written = report.written(),
            skipped = report.skipped,
            errored = report.errored,
            "adapter finished"
        );
        report
    }

    fn cancelled_report(&self, adapter: &dyn SiteAdapter) -> AdapterReport {
        let mut report = AdapterReport::new(adapter.name());
        report.status = AdapterStatus::Cancelled;
        report
    }

    /// Fills the translated fields; failures leave them empty
    async fn translate(&self, listing: &mut CanonicalListing) {
        let Some(translator) = &self.translator else {
            return;
        };

        listing.title_translated = self.translate_text(translator.as_ref(), &listing.title).await;
        if let Some(description) = listing.description.clone() {
            listing.description_translated =
                self.translate_text(translator.as_ref(), &description).await;
        }
    }

    async fn translate_text(&self, translator: &dyn Translator, text: &str) -> Option<String> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = translator.translate(text) => match result {
                Ok(translated) => Some(translated),
                Err(e) => {
                    warn!("translation failed: {}", e);
                    None
                }
            },
        }
    }
}
