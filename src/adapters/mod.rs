//! Site adapters
//!
//! Each supported source implements [`SiteAdapter`] on its own: how to build
//! listing-page URLs for a search, how to turn a listing page into stubs, and
//! how to read a listing's detail page. Adapters hold no crawl state; paging,
//! throttling and retries live in the crawler.
//!
//! Adapters are selected by name through a constructor registry:
//!
//! ```
//! use japanhouse_ingest::adapters::{available_adapters, build_adapter};
//!
//! assert!(available_adapters().contains(&"suumo"));
//! let adapter = build_adapter("athome", None).unwrap();
//! assert_eq!(adapter.name(), "athome");
//! ```

pub mod html;

mod akiyamart;
mod athome;
mod homes;
mod suumo;

pub use akiyamart::AkiyaMartAdapter;
pub use athome::AtHomeAdapter;
pub use homes::HomesAdapter;
pub use suumo::SuumoAdapter;

use crate::listing::{DetailRecord, PropertyType, RawListingStub};
use crate::IngestError;
use thiserror::Error;
use url::Url;

/// Errors that invalidate a whole listing or detail page
#[derive(Debug, Error)]
pub enum PageError {
    /// The markup no longer matches what the adapter expects
    #[error("{adapter}: unrecognized page structure: {message}")]
    Structure { adapter: String, message: String },

    #[error("{adapter}: invalid selector {message}")]
    Selector { adapter: String, message: String },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl PageError {
    pub fn structure(adapter: &str, message: impl Into<String>) -> Self {
        PageError::Structure {
            adapter: adapter.to_string(),
            message: message.into(),
        }
    }
}

/// What the user asked to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Location name such as `tokyo`; each adapter maps it to its own codes
    pub location: String,
    pub property_type: PropertyType,
}

impl SearchQuery {
    pub fn new(location: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            location: location.into().trim().to_lowercase(),
            property_type,
        }
    }
}

/// Result of parsing one listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Stubs in page order
    pub stubs: Vec<RawListingStub>,

    /// Reasons for listing cards that could not be turned into stubs
    pub item_errors: Vec<String>,

    /// Whether the page links to a following page
    pub has_next: bool,
}

/// Fetch/parse contract implemented by every source
pub trait SiteAdapter: Send + Sync {
    /// Registry name, also stored as the listing's `source`
    fn name(&self) -> &'static str;

    fn base_url(&self) -> &Url;

    /// URL of listing page `page` (1-based) for a search
    fn listing_page_url(&self, query: &SearchQuery, page: u32) -> Result<Url, PageError>;

    /// Parses a listing page into stubs
    ///
    /// A card that cannot be parsed is reported in `item_errors` and skipped.
    /// A page with no recognizable listing container at all is an error.
    fn parse_listing_page(&self, html: &str, query: &SearchQuery)
        -> Result<ListingPage, PageError>;

    /// URL of the stub's detail page; defaults to the stub's own URL
    fn detail_page_url(&self, stub: &RawListingStub) -> Option<Url> {
        Url::parse(&stub.url).ok()
    }

    fn parse_detail_page(&self, html: &str, stub: &RawListingStub)
        -> Result<DetailRecord, PageError>;
}

type AdapterConstructor = fn(Url) -> Box<dyn SiteAdapter>;

struct RegistryEntry {
    name: &'static str,
    default_base_url: &'static str,
    build: AdapterConstructor,
}

const REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        name: "suumo",
        default_base_url: "https://suumo.jp/",
        build: SuumoAdapter::boxed,
    },
    RegistryEntry {
        name: "homes",
        default_base_url: "https://www.homes.co.jp/",
        build: HomesAdapter::boxed,
    },
    RegistryEntry {
        name: "athome",
        default_base_url: "https://www.athome.co.jp/",
        build: AtHomeAdapter::boxed,
    },
    RegistryEntry {
        name: "akiyamart",
        default_base_url: "https://www.akiya-mart.com/",
        build: AkiyaMartAdapter::boxed,
    },
];

/// Names of every registered adapter, in registry order
pub fn available_adapters() -> Vec<&'static str> {
    REGISTRY.iter().map(|entry| entry.name).collect()
}

/// Builds an adapter by name
///
/// # Arguments
///
/// * `name` - Registry name (case-insensitive)
/// * `base_url_override` - Replaces the adapter's production base URL
///
/// # Returns
///
/// * `Err(IngestError::UnknownAdapter)` - The name is not registered
/// * `Err(IngestError::InvalidBaseUrl)` - The override does not parse
pub fn build_adapter(
    name: &str,
    base_url_override: Option<&str>,
) -> crate::Result<Box<dyn SiteAdapter>> {
    let wanted = name.trim().to_lowercase();
    let entry = REGISTRY
        .iter()
        .find(|entry| entry.name == wanted)
        .ok_or_else(|| IngestError::UnknownAdapter {
            name: name.to_string(),
            available: available_adapters().join(", "),
        })?;

    let raw = base_url_override.unwrap_or(entry.default_base_url);
    let mut base = Url::parse(raw).map_err(|source| IngestError::InvalidBaseUrl {
        adapter: entry.name.to_string(),
        source,
    })?;

    // Relative joins would otherwise replace the last path segment
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    Ok((entry.build)(base))
}

/// Appends a relative path to an adapter base URL
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, PageError> {
    Ok(base.join(path.trim_start_matches('/'))?)
}

/// Copies a labelled listing-card row onto the stub field it describes
pub(crate) fn fill_stub_field(stub: &mut RawListingStub, label: &str, value: String) {
    match html::classify_label(label) {
        Some(html::RowField::Layout) => stub.raw_layout = Some(value),
        Some(html::RowField::Size) => stub.raw_size = Some(value),
        Some(html::RowField::YearBuilt) => stub.raw_year_built = Some(value),
        Some(html::RowField::BuildingType) => stub.raw_building_type = Some(value),
        Some(html::RowField::Location) => stub.raw_location = Some(value),
        Some(html::RowField::Price) => stub.raw_price = Some(value),
        None => {}
    }
}

/// Copies a labelled detail-page row onto the detail field it describes
///
/// The first occurrence of a field wins; property tables often repeat labels
/// further down with less precise values.
pub(crate) fn fill_detail_field(record: &mut DetailRecord, label: &str, value: String) {
    let slot = match html::classify_label(label) {
        Some(html::RowField::Layout) => &mut record.raw_layout,
        Some(html::RowField::Size) => &mut record.raw_size,
        Some(html::RowField::YearBuilt) => &mut record.raw_year_built,
        Some(html::RowField::BuildingType) => &mut record.raw_building_type,
        Some(html::RowField::Location) => &mut record.raw_location,
        Some(html::RowField::Price) => &mut record.raw_price,
        None => return,
    };

    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Selector candidates describing one site's detail-page template
pub(crate) struct DetailLayout<'a> {
    pub galleries: &'a [&'a str],
    pub descriptions: &'a [&'a str],
    pub features: &'a [&'a str],
    /// Row selectors of th/td property tables
    pub tables: &'a [&'a str],
}

/// Parses a detail page laid out as described by `layout`
///
/// A page from which nothing at all can be read is a structure error.
pub(crate) fn parse_detail_with(
    adapter: &str,
    document_html: &str,
    stub: &RawListingStub,
    base: &Url,
    layout: &DetailLayout<'_>,
) -> Result<DetailRecord, PageError> {
    let document = scraper::Html::parse_document(document_html);
    let root = html::root(&document);

    let galleries = html::selectors(adapter, layout.galleries)?;
    let descriptions = html::selectors(adapter, layout.descriptions)?;
    let features = html::selectors(adapter, layout.features)?;
    let tables = html::selectors(adapter, layout.tables)?;

    let mut record = DetailRecord {
        external_id: stub.external_id.clone(),
        description: html::first_text_any(root, &descriptions),
        images: html::collect_images(root, &galleries, base),
        features: features
            .iter()
            .map(|sel| html::all_texts(root, sel))
            .find(|found| !found.is_empty())
            .unwrap_or_default(),
        ..DetailRecord::default()
    };

    for rows in &tables {
        for (label, value) in html::table_pairs(root, rows) {
            fill_detail_field(&mut record, &label, value);
        }
    }

    if detail_is_empty(&record) {
        return Err(PageError::structure(
            adapter,
            format!("no detail content recognized for {}", stub.external_id),
        ));
    }

    Ok(record)
}

/// True when a detail record carries nothing beyond its id
pub(crate) fn detail_is_empty(record: &DetailRecord) -> bool {
    record.description.is_none()
        && record.images.is_empty()
        && record.features.is_empty()
        && record.raw_year_built.is_none()
        && record.raw_building_type.is_none()
        && record.raw_location.is_none()
        && record.raw_price.is_none()
        && record.raw_size.is_none()
        && record.raw_layout.is_none()
}
