//! Ingest runs
//!
//! This module ties the pipeline together:
//! - [`Orchestrator`] selects adapters and runs them on a bounded pool
//! - [`Upserter`] reconciles normalized listings with the store
//! - [`RunSummary`] collects per-adapter counters for the end-of-run table

mod orchestrator;
mod summary;
mod upsert;

pub use orchestrator::{Orchestrator, RunOptions};
pub use summary::{print_summary, AdapterReport, AdapterStatus, RunSummary};
pub use upsert::{decide, UpsertAction, Upserter};
