//! Normalization of stubs and detail records into canonical listings
//!
//! The normalizer never fails: unparseable fields become `None`, and a
//! listing that must not be stored comes back as [`Normalized::Skipped`]
//! with the reason attached.

mod images;
mod numeric;

pub use images::{clean_images, qualifying_count, width_hint};
pub use numeric::{parse_area, parse_decimal, parse_price, parse_year, SQM_PER_TSUBO};

use crate::config::ImageConfig;
use crate::listing::{listing_id, CanonicalListing, DetailRecord, RawListingStub};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// Image-quality policy applied before persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePolicy {
    pub enforce: bool,
    pub min_count: usize,
    pub min_width: Option<u32>,
}

impl ImagePolicy {
    pub fn new(enforce: bool, config: &ImageConfig) -> Self {
        Self {
            enforce,
            min_count: config.min_count.max(1),
            min_width: config.min_width,
        }
    }

    /// Policy with enforcement switched off
    pub fn lenient() -> Self {
        Self {
            enforce: false,
            min_count: 1,
            min_width: None,
        }
    }

    fn check(&self, images: &[String]) -> Option<SkipReason> {
        if !self.enforce {
            return None;
        }
        if images.is_empty() {
            return Some(SkipReason::NoImages);
        }

        let found = qualifying_count(images, self.min_width);
        (found < self.min_count).then_some(SkipReason::TooFewImages {
            found,
            required: self.min_count,
        })
    }
}

/// Why a listing was not turned into a canonical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    MissingUrl,
    NoImages,
    TooFewImages { found: usize, required: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingTitle => write!(f, "missing title"),
            SkipReason::MissingUrl => write!(f, "missing url"),
            SkipReason::NoImages => write!(f, "no usable images"),
            SkipReason::TooFewImages { found, required } => {
                write!(f, "{} qualifying images, {} required", found, required)
            }
        }
    }
}

/// An explicit, non-error skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSkip {
    pub id: String,
    pub external_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Listing(Box<CanonicalListing>),
    Skipped(ValidationSkip),
}

/// Merges stub and detail data into the canonical schema
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: ImagePolicy,
}

impl Normalizer {
    pub fn new(policy: ImagePolicy) -> Self {
        Self { policy }
    }

    /// Builds the canonical listing for one stub
    ///
    /// Detail values win over listing-page values when both exist. The image
    /// list comes from the detail page when it has any, otherwise from the
    /// stub's thumbnail. The content hash is computed last.
    ///
    /// # Arguments
    ///
    /// * `stub` - The listing-page stub
    /// * `detail` - Detail-page data, if it was fetched
    /// * `detail_incomplete` - Detail fetching was requested but failed
    /// * `now` - Observation time, used for both timestamps
    pub fn normalize(
        &self,
        stub: RawListingStub,
        detail: Option<DetailRecord>,
        detail_incomplete: bool,
        now: DateTime<Utc>,
    ) -> Normalized {
        let id = listing_id(&stub.source, &stub.external_id);
        let skip = |reason| {
            Normalized::Skipped(ValidationSkip {
                id: id.clone(),
                external_id: stub.external_id.clone(),
                reason,
            })
        };

        let title = stub.title.trim().to_string();
        if title.is_empty() {
            return skip(SkipReason::MissingTitle);
        }
        let url = stub.url.trim().to_string();
        if url.is_empty() {
            return skip(SkipReason::MissingUrl);
        }

        let detail = detail.unwrap_or_default();

        let raw_images = if detail.images.is_empty() {
            stub.thumbnail_url.iter().cloned().collect::<Vec<_>>()
        } else {
            detail.images.clone()
        };
        let images = clean_images(raw_images);
        if let Some(reason) = self.policy.check(&images) {
            return skip(reason);
        }

        let prefer = |detail_value: &Option<String>, stub_value: &Option<String>| {
            text(detail_value).or_else(|| text(stub_value))
        };

        let features: BTreeSet<String> = stub
            .features
            .iter()
            .chain(detail.features.iter())
            .map(|feature| feature.trim())
            .filter(|feature| !feature.is_empty())
            .map(str::to_string)
            .collect();

        let mut listing = CanonicalListing {
            id: id.clone(),
            source: stub.source.clone(),
            external_id: stub.external_id.trim().to_string(),
            url,
            title,
            property_type: stub.property_type,
            location: prefer(&detail.raw_location, &stub.raw_location),
            price: prefer(&detail.raw_price, &stub.raw_price)
                .as_deref()
                .and_then(parse_price),
            size: prefer(&detail.raw_size, &stub.raw_size)
                .as_deref()
                .and_then(parse_area),
            layout: prefer(&detail.raw_layout, &stub.raw_layout),
            year_built: prefer(&detail.raw_year_built, &stub.raw_year_built)
                .as_deref()
                .and_then(parse_year),
            building_type: prefer(&detail.raw_building_type, &stub.raw_building_type),
            description: text(&detail.description),
            images,
            features,
            detail_incomplete,
            title_translated: None,
            description_translated: None,
            first_seen_at: now,
            last_seen_at: now,
            content_hash: String::new(),
        };
        listing.seal();

        Normalized::Listing(Box::new(listing))
    }
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
