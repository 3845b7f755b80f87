//! Configuration module
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every section has defaults, so a run without a file
//! behaves like a run with an empty one.
//!
//! # Example
//!
//! ```no_run
//! use japanhouse_ingest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ingest.toml")).unwrap();
//! println!("Request spacing: {}ms", config.crawler.min_request_interval_ms);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, ImageConfig, OutputConfig, RetryConfig, SiteEntry, TranslationConfig,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
