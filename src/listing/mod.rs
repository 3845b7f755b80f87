//! Listing data model
//!
//! Three shapes move through the pipeline:
//!
//! - [`RawListingStub`]: what a listing page shows about one property
//! - [`DetailRecord`]: what the property's own page adds
//! - [`CanonicalListing`]: the merged, normalized unit that gets persisted

mod identity;

pub use identity::{listing_id, FieldHasher};

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// Search mode a stub was found under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PropertyType {
    Rent,
    Buy,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Rent => "rent",
            PropertyType::Buy => "buy",
        }
    }

    /// Parses the value stored in the `property_type` column
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "rent" => Some(PropertyType::Rent),
            "buy" => Some(PropertyType::Buy),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A minimally parsed listing reference taken from a listing page
///
/// Raw fields keep the source's own text; numeric coercion happens later in
/// the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawListingStub {
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub property_type: PropertyType,
    pub raw_price: Option<String>,
    pub raw_size: Option<String>,
    pub raw_layout: Option<String>,
    pub raw_location: Option<String>,
    pub raw_year_built: Option<String>,
    pub raw_building_type: Option<String>,
    pub thumbnail_url: Option<String>,
    pub features: Vec<String>,
}

impl RawListingStub {
    /// Creates a stub with only the identifying fields set
    pub fn new(
        source: &str,
        external_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        property_type: PropertyType,
    ) -> Self {
        Self {
            source: source.to_string(),
            external_id: external_id.into(),
            title: title.into(),
            url: url.into(),
            property_type,
            raw_price: None,
            raw_size: None,
            raw_layout: None,
            raw_location: None,
            raw_year_built: None,
            raw_building_type: None,
            thumbnail_url: None,
            features: Vec::new(),
        }
    }

    /// Stable id of the listing this stub refers to
    pub fn id(&self) -> String {
        listing_id(&self.source, &self.external_id)
    }
}

/// Fields only a detail page provides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailRecord {
    pub external_id: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub features: Vec<String>,
    pub raw_year_built: Option<String>,
    pub raw_building_type: Option<String>,
    pub raw_location: Option<String>,
    pub raw_price: Option<String>,
    pub raw_size: Option<String>,
    pub raw_layout: Option<String>,
}

/// The persisted, source-independent listing
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalListing {
    pub id: String,
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub property_type: PropertyType,
    pub location: Option<String>,
    /// Yen
    pub price: Option<i64>,
    /// Square meters
    pub size: Option<f64>,
    pub layout: Option<String>,
    pub year_built: Option<i32>,
    pub building_type: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub features: BTreeSet<String>,
    pub detail_incomplete: bool,
    pub title_translated: Option<String>,
    pub description_translated: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub content_hash: String,
}

impl CanonicalListing {
    /// Fingerprint over every canonical field
    ///
    /// Timestamps and translation annotations are left out, so re-seeing an
    /// unchanged listing later (or translating it) keeps the same hash.
    pub fn compute_content_hash(&self) -> String {
        FieldHasher::new()
            .text("id", &self.id)
            .text("source", &self.source)
            .text("external_id", &self.external_id)
            .text("url", &self.url)
            .text("title", &self.title)
            .text("property_type", self.property_type.as_str())
            .opt_text("location", self.location.as_deref())
            .opt_int("price", self.price)
            .opt_float("size", self.size)
            .opt_text("layout", self.layout.as_deref())
            .opt_int("year_built", self.year_built.map(i64::from))
            .opt_text("building_type", self.building_type.as_deref())
            .opt_text("description", self.description.as_deref())
            .list("images", &self.images)
            .list("features", &self.features)
            .flag("detail_incomplete", self.detail_incomplete)
            .finish()
    }

    /// Recomputes and stores the content hash; call after the last field change
    pub fn seal(&mut self) {
        self.content_hash = self.compute_content_hash();
    }
}
