//! LIFULL HOME'S (homes.co.jp)
//!
//! The listing template has changed several times, so listing containers are
//! located through an ordered fallback list and the first selector that
//! matches anything wins.

use crate::adapters::html::{self, first_text, first_text_any, resolve, selector, selectors};
use crate::adapters::{
    join_path, parse_detail_with, DetailLayout, ListingPage, PageError, SearchQuery, SiteAdapter,
};
use crate::listing::{DetailRecord, PropertyType, RawListingStub};
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

const NAME: &str = "homes";

const CONTAINERS: &[&str] = &[
    ".moduleInner.property",
    ".property-item",
    ".property-card",
    ".object-item",
    "article.property",
    ".property-list-item",
    ".bukken-cassette",
    ".cassette",
    ".itembox",
];

/// Result-list wrappers that stay on the page when a search matches nothing
const RESULT_LISTS: &[&str] = &["#prg-bukkenList", ".mod-mergeBuilding--sale", ".prg-bukkenList"];

const LINKS: &[&str] = &[
    "h2.devMansionTitle a[href]",
    ".bukkenName a[href]",
    "a[href*=\"detail\"]",
    "a[href]",
];

const TITLES: &[&str] = &["h2.devMansionTitle a", ".bukkenName", "h2", "h3", ".title"];

const PREFECTURES: &[&str] = &[
    "tokyo", "kanagawa", "saitama", "chiba", "osaka", "kyoto", "hyogo", "aichi", "fukuoka",
    "hokkaido", "okayama",
];

const DETAIL_LAYOUT: DetailLayout<'static> = DetailLayout {
    galleries: &[
        "div.detailGallery img",
        "div.photoGallery img",
        "div.carousel img",
        "div.detailPhotos img",
        "img[width=\"600\"], img[width=\"800\"], img[width=\"1024\"]",
        "div.photo img, div.mainPhoto img",
        "img[src*=\"/img.homes.jp/\"]",
    ],
    descriptions: &[".bukkenComment", ".mod-bukkenComment", ".detailComment", "#comment"],
    features: &["ul.articleTagList li", ".bukkenSpec-feature li", ".equipment li"],
    tables: &[
        "table.bukkenSpec tr",
        "table.vertical tr",
        ".mod-bukkenSpecDetail tr",
    ],
};

pub struct HomesAdapter {
    base_url: Url,
}

impl HomesAdapter {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn boxed(base_url: Url) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(base_url))
    }

    fn prefecture(location: &str) -> &'static str {
        PREFECTURES
            .iter()
            .find(|name| **name == location)
            .copied()
            .unwrap_or("tokyo")
    }

    /// Container elements from the first selector that matches any
    fn containers<'a>(root: ElementRef<'a>) -> Result<Vec<ElementRef<'a>>, PageError> {
        for css in CONTAINERS {
            let sel = selector(NAME, css)?;
            let found: Vec<ElementRef<'a>> = root.select(&sel).collect();
            if !found.is_empty() {
                debug!(selector = *css, count = found.len(), "homes listing containers");
                return Ok(found);
            }
        }

        Ok(Vec::new())
    }
}

impl SiteAdapter for HomesAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn listing_page_url(&self, query: &SearchQuery, page: u32) -> Result<Url, PageError> {
        let section = match query.property_type {
            PropertyType::Rent => "chintai",
            PropertyType::Buy => "kodate/chuko",
        };
        let path = format!("{}/{}/list/", section, Self::prefecture(&query.location));

        let mut url = join_path(&self.base_url, &path)?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    fn parse_listing_page(
        &self,
        html: &str,
        query: &SearchQuery,
    ) -> Result<ListingPage, PageError> {
        let document = Html::parse_document(html);
        let root = html::root(&document);

        let containers = Self::containers(root)?;
        if containers.is_empty() {
            if html::is_empty_result(NAME, root, RESULT_LISTS)? {
                debug!("{}: search returned no listings", NAME);
                return Ok(ListingPage::default());
            }
            return Err(PageError::structure(
                NAME,
                "none of the known listing containers matched",
            ));
        }

        let links = selectors(NAME, LINKS)?;
        let titles = selectors(NAME, TITLES)?;
        let price = selector(NAME, ".priceLabel")?;
        let address = selector(NAME, ".abAddress")?;
        let layout = selector(NAME, ".madoriInfo")?;
        let size = selector(NAME, ".areaInfo")?;
        let building_type = selector(NAME, ".buildingTypeInfo")?;
        let built = selector(NAME, ".builtDateInfo")?;
        let tags = selector(NAME, "ul.articleTagList li")?;
        let visual = selector(NAME, ".mainvisual img")?;

        let mut page = ListingPage::default();

        for (index, element) in containers.into_iter().enumerate() {
            let url = links
                .iter()
                .find_map(|sel| html::first_attr(element, sel, "href"))
                .and_then(|href| resolve(href, &self.base_url));
            let Some(url) = url else {
                page.item_errors
                    .push(format!("listing {} has no link", index + 1));
                continue;
            };

            let Some(external_id) = html::external_id_from_url(&url, None) else {
                page.item_errors
                    .push(format!("cannot derive listing id from {}", url));
                continue;
            };

            let mut stub = RawListingStub::new(
                NAME,
                external_id,
                first_text_any(element, &titles).unwrap_or_default(),
                url,
                query.property_type,
            );
            stub.raw_price = first_text(element, &price);
            stub.raw_location = first_text(element, &address);
            stub.raw_layout = first_text(element, &layout);
            stub.raw_size = first_text(element, &size);
            stub.raw_building_type = first_text(element, &building_type);
            stub.raw_year_built = first_text(element, &built);
            stub.features = html::all_texts(element, &tags);
            stub.thumbnail_url = element
                .select(&visual)
                .find_map(html::image_source)
                .and_then(|src| resolve(src, &self.base_url));
            page.stubs.push(stub);
        }

        let next = selector(NAME, "li.nextPage a[href]")?;
        page.has_next = root.select(&next).next().is_some();
        Ok(page)
    }

    fn parse_detail_page(
        &self,
        html: &str,
        stub: &RawListingStub,
    ) -> Result<DetailRecord, PageError> {
        let base = Url::parse(&stub.url).unwrap_or_else(|_| self.base_url.clone());
        parse_detail_with(NAME, html, stub, &base, &DETAIL_LAYOUT)
    }
}
