//! Akiya Mart (akiya-mart.com)
//!
//! Card markup is not stable, so every field is read through a list of
//! candidate selectors.

use crate::adapters::html::{self, first_text_any, resolve, selector, selectors};
use crate::adapters::{
    join_path, parse_detail_with, DetailLayout, ListingPage, PageError, SearchQuery, SiteAdapter,
};
use crate::listing::{DetailRecord, RawListingStub};
use scraper::{ElementRef, Html};
use url::Url;

const NAME: &str = "akiyamart";

const CARDS: &[&str] = &[".property-card", ".property-item", ".bukken-item", ".listing", "article"];
const TITLES: &[&str] = &[".property-title", ".listing-title", "h2", "h3", ".title"];
const PRICES: &[&str] = &[".property-price", ".price", ".listing-price", ".cost"];
const LOCATIONS: &[&str] = &[".property-location", ".location", ".address", ".listing-address"];
const SIZES: &[&str] = &[".property-size", ".size", ".sqm", ".area"];
const ROOMS: &[&str] = &[".property-rooms", ".rooms", ".bedroom-count"];
const YEARS: &[&str] = &[".property-year", ".year-built", ".built"];
const LINKS: &[&str] = &["a.property-link[href]", ".listing-link[href]", ".card-link[href]", "a[href]"];
const IMAGES: &[&str] = &[".property-image img", ".thumbnail img", ".photo img", "img"];
const RESULT_LISTS: &[&str] = &[".search-results", ".property-list", ".listing-results"];
const NEXT: &[&str] = &[
    ".pagination-next:not(.disabled)[href]",
    ".pagination-next:not(.disabled) a[href]",
    "a[rel=\"next\"][href]",
    "a.next[href]",
    "li.next a[href]",
    "a.next-page[href]",
];

/// JIS prefecture codes used in search paths
const PREFECTURE_CODES: &[(&str, &str)] = &[
    ("hokkaido", "01"),
    ("saitama", "11"),
    ("chiba", "12"),
    ("tokyo", "13"),
    ("kanagawa", "14"),
    ("aichi", "23"),
    ("kyoto", "26"),
    ("osaka", "27"),
    ("hyogo", "28"),
    ("okayama", "33"),
    ("fukuoka", "40"),
];

const DETAIL_LAYOUT: DetailLayout<'static> = DetailLayout {
    galleries: &[
        ".property-gallery img",
        ".gallery img",
        ".swiper-slide img",
        ".property-image img",
    ],
    descriptions: &[".property-description", ".description", "#description"],
    features: &[".property-features li", ".features li", ".amenities li"],
    tables: &["table.property-details tr", ".details table tr", "table tr"],
};

pub struct AkiyaMartAdapter {
    base_url: Url,
}

impl AkiyaMartAdapter {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn boxed(base_url: Url) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(base_url))
    }

    fn prefecture_code(location: &str) -> &'static str {
        PREFECTURE_CODES
            .iter()
            .find(|(name, _)| *name == location)
            .map(|(_, code)| *code)
            .unwrap_or("13")
    }

    fn cards<'a>(root: ElementRef<'a>) -> Result<Vec<ElementRef<'a>>, PageError> {
        for css in CARDS {
            let sel = selector(NAME, css)?;
            let found: Vec<ElementRef<'a>> = root.select(&sel).collect();
            if !found.is_empty() {
                return Ok(found);
            }
        }
        Ok(Vec::new())
    }
}

impl SiteAdapter for AkiyaMartAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn listing_page_url(&self, query: &SearchQuery, page: u32) -> Result<Url, PageError> {
        let path = format!(
            "akiyabank/prefecture/{}",
            Self::prefecture_code(&query.location)
        );
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

        let cards = Self::cards(root)?;
        if cards.is_empty() {
            if html::is_empty_result(NAME, root, RESULT_LISTS)? {
                tracing::debug!("{}: search returned no listings", NAME);
                return Ok(ListingPage::default());
            }
            return Err(PageError::structure(NAME, "no property cards found"));
        }

        let titles = selectors(NAME, TITLES)?;
        let prices = selectors(NAME, PRICES)?;
        let locations = selectors(NAME, LOCATIONS)?;
        let sizes = selectors(NAME, SIZES)?;
        let rooms = selectors(NAME, ROOMS)?;
        let years = selectors(NAME, YEARS)?;
        let links = selectors(NAME, LINKS)?;
        let images = selectors(NAME, IMAGES)?;

        let mut page = ListingPage::default();

        for (index, card) in cards.into_iter().enumerate() {
            let url = links
                .iter()
                .find_map(|sel| html::first_attr(card, sel, "href"))
                .and_then(|href| resolve(href, &self.base_url));
            let Some(url) = url else {
                page.item_errors
                    .push(format!("card {} has no link", index + 1));
                continue;
            };
            let Some(external_id) = html::external_id_from_url(&url, Some("id")) else {
                page.item_errors
                    .push(format!("cannot derive listing id from {}", url));
                continue;
            };

            let mut stub = RawListingStub::new(
                NAME,
                external_id,
                first_text_any(card, &titles).unwrap_or_default(),
                url,
                query.property_type,
            );
            stub.raw_price = first_text_any(card, &prices);
            stub.raw_location = first_text_any(card, &locations);
            stub.raw_size = first_text_any(card, &sizes);
            stub.raw_layout = first_text_any(card, &rooms);
            stub.raw_year_built = first_text_any(card, &years);
            stub.thumbnail_url = html::collect_images(card, &images, &self.base_url)
                .into_iter()
                .next();
            page.stubs.push(stub);
        }

        let next = selectors(NAME, NEXT)?;
        page.has_next = next.iter().any(|sel| root.select(sel).next().is_some());
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::PropertyType;

    fn adapter() -> AkiyaMartAdapter {
        AkiyaMartAdapter::new(Url::parse("https://www.akiya-mart.com/").unwrap())
    }

    #[test]
    fn test_listing_page_url() {
        let query = SearchQuery::new("okayama", PropertyType::Buy);
        assert_eq!(
            adapter().listing_page_url(&query, 2).unwrap().as_str(),
            "https://www.akiya-mart.com/akiyabank/prefecture/33?page=2"
        );
        let unknown = SearchQuery::new("shikoku", PropertyType::Buy);
        assert!(adapter()
            .listing_page_url(&unknown, 1)
            .unwrap()
            .as_str()
            .contains("/prefecture/13"));
    }

    #[test]
    fn test_candidate_selectors() {
        let html = r#"
<html><body>
  <div class="property-item">
    <h3>Farmhouse in Maniwa</h3>
    <span class="cost">¥3,000,000</span>
    <span class="address">Maniwa, Okayama</span>
    <div class="details"><span class="area">120 sqm</span><span class="rooms">5DK</span></div>
    <a href="/listings/8812">View</a>
    <div class="thumbnail"><img src="https://cdn.akiya-mart.com/8812/main.jpg"></div>
  </div>
  <div class="property-item"><h3>No link</h3></div>
  <a rel="next" href="?page=2">Next</a>
</body></html>"#;

        let query = SearchQuery::new("okayama", PropertyType::Buy);
        let page = adapter().parse_listing_page(html, &query).unwrap();

        assert!(page.has_next);
        assert_eq!(page.stubs.len(), 1);
        assert_eq!(page.item_errors.len(), 1);

        let stub = &page.stubs[0];
        assert_eq!(stub.external_id, "8812");
        assert_eq!(stub.title, "Farmhouse in Maniwa");
        assert_eq!(stub.raw_price.as_deref(), Some("¥3,000,000"));
        assert_eq!(stub.raw_location.as_deref(), Some("Maniwa, Okayama"));
        assert_eq!(stub.raw_size.as_deref(), Some("120 sqm"));
        assert_eq!(stub.raw_layout.as_deref(), Some("5DK"));
        assert_eq!(
            stub.thumbnail_url.as_deref(),
            Some("https://cdn.akiya-mart.com/8812/main.jpg")
        );
        assert_eq!(stub.url, "https://www.akiya-mart.com/listings/8812");
    }

    #[test]
    fn test_no_cards_is_structure_error() {
        let query = SearchQuery::new("okayama", PropertyType::Buy);
        assert!(adapter()
            .parse_listing_page("<html><body><div>empty</div></body></html>", &query)
            .is_err());
    }

    #[test]
    fn test_empty_search_result_is_a_last_page() {
        let query = SearchQuery::new("okayama", PropertyType::Buy);
        let page = adapter()
            .parse_listing_page(
                r#"<html><body><div class="search-results"></div>
                   <p>該当する物件はありません</p></body></html>"#,
                &query,
            )
            .unwrap();
        assert!(page.stubs.is_empty());
        assert!(page.item_errors.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_no_results_notice_without_wrapper() {
        let query = SearchQuery::new("okayama", PropertyType::Buy);
        let page = adapter()
            .parse_listing_page("<html><body><p>No properties found</p></body></html>", &query)
            .unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_parse_detail_page() {
        let stub = RawListingStub::new(
            NAME,
            "8812",
            "Farmhouse in Maniwa",
            "https://www.akiya-mart.com/listings/8812",
            PropertyType::Buy,
        );
        let html = r#"
<html><body>
  <div class="gallery"><img src="/img/8812/1.jpg"><img src="/img/8812/2.jpg"></div>
  <div class="description">Traditional house with a large garden.</div>
  <table class="property-details"><tr><th>築年</th><td>昭和55年</td></tr></table>
</body></html>"#;

        let record = adapter().parse_detail_page(html, &stub).unwrap();
        assert_eq!(
            record.images,
            vec![
                "https://www.akiya-mart.com/img/8812/1.jpg",
                "https://www.akiya-mart.com/img/8812/2.jpg"
            ]
        );
        assert_eq!(
            record.description.as_deref(),
            Some("Traditional house with a large garden.")
        );
        assert_eq!(record.raw_year_built.as_deref(), Some("昭和55年"));
    }
}
