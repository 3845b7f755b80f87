//! Per-adapter counters and the end-of-run summary table

use crate::ingest::UpsertAction;
use chrono::{DateTime, Utc};
use std::fmt;

/// How an adapter's worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterStatus {
    Completed,
    Failed(String),
    Cancelled,
}

impl AdapterStatus {
    fn label(&self) -> &str {
        match self {
            AdapterStatus::Completed => "completed",
            AdapterStatus::Failed(_) => "failed",
            AdapterStatus::Cancelled => "cancelled",
        }
    }
}

/// Counters for one adapter in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    pub name: String,
    pub status: AdapterStatus,

    /// Listing pages that returned a body
    pub pages_fetched: u32,

    /// Unique stubs kept by the crawl
    pub stubs_retained: usize,

    /// Stubs dropped because their id was already seen in this run
    pub duplicates: usize,

    /// First id seen ever
    pub inserted: usize,

    /// Extra history rows written for known ids
    pub appended: usize,

    /// Known ids whose content changed (update-mode)
    pub updated: usize,

    /// Known ids with unchanged content (update-mode)
    pub refreshed: usize,

    /// Listings turned away by validation
    pub skipped: usize,

    /// Listing cards, pages or writes that failed
    pub errored: usize,

    /// Stored without detail-page data although it was requested
    pub detail_incomplete: usize,

    pub page_errors: Vec<String>,
}

impl AdapterReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AdapterStatus::Completed,
            pages_fetched: 0,
            stubs_retained: 0,
            duplicates: 0,
            inserted: 0,
            appended: 0,
            updated: 0,
            refreshed: 0,
            skipped: 0,
            errored: 0,
            detail_incomplete: 0,
            page_errors: Vec::new(),
        }
    }

    /// Counts the outcome of one store write
    pub fn record(&mut self, action: UpsertAction) {
        match action {
            UpsertAction::Inserted => self.inserted += 1,
            UpsertAction::Appended => self.appended += 1,
            UpsertAction::Updated => self.updated += 1,
            UpsertAction::Refreshed => self.refreshed += 1,
        }
    }

    /// Rows written to the store
    pub fn written(&self) -> usize {
        self.inserted + self.appended + self.updated + self.refreshed
    }
}

/// Aggregated result of one ingest run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<AdapterReport>,
}

impl RunSummary {
    /// At least one adapter finished without a fatal error
    pub fn is_success(&self) -> bool {
        self.reports
            .iter()
            .any(|report| report.status == AdapterStatus::Completed)
    }

    pub fn report(&self, name: &str) -> Option<&AdapterReport> {
        self.reports.iter().find(|report| report.name == name)
    }

    pub fn total_written(&self) -> usize {
        self.reports.iter().map(AdapterReport::written).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ingest Run {} ===\n", self.run_id)?;
        writeln!(
            f,
            "{:<10} {:<10} {:>5} {:>6} {:>8} {:>8} {:>7} {:>9} {:>7} {:>7} {:>10}",
            "adapter",
            "status",
            "pages",
            "stubs",
            "inserted",
            "appended",
            "updated",
            "refreshed",
            "skipped",
            "errored",
            "no-detail"
        )?;

        for report in &self.reports {
            writeln!(
                f,
                "{:<10} {:<10} {:>5} {:>6} {:>8} {:>8} {:>7} {:>9} {:>7} {:>7} {:>10}",
                report.name,
                report.status.label(),
                report.pages_fetched,
                report.stubs_retained,
                report.inserted,
                report.appended,
                report.updated,
                report.refreshed,
                report.skipped,
                report.errored,
                report.detail_incomplete
            )?;
        }

        let failures: Vec<_> = self
            .reports
            .iter()
            .filter_map(|report| match &report.status {
                AdapterStatus::Failed(reason) => Some((report.name.as_str(), reason.as_str())),
                _ => None,
            })
            .collect();
        if !failures.is_empty() {
            writeln!(f, "\nFailed adapters:")?;
            for (name, reason) in failures {
                writeln!(f, "  - {}: {}", name, reason)?;
            }
        }

        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "\nRows written: {} in {:.1}s",
            self.total_written(),
            elapsed.num_milliseconds() as f64 / 1000.0
        )?;
        write!(
            f,
            "Overall: {}",
            if self.is_success() { "success" } else { "failure" }
        )
    }
}

/// Prints the summary table to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("{}", summary);
}
