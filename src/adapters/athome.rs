//! at home (athome.co.jp)

use crate::adapters::html::{self, first_text, resolve, selector};
use crate::adapters::{
    fill_stub_field, join_path, parse_detail_with, DetailLayout, ListingPage, PageError,
    SearchQuery, SiteAdapter,
};
use crate::listing::{DetailRecord, PropertyType, RawListingStub};
use scraper::{ElementRef, Html};
use url::Url;

const NAME: &str = "athome";

/// Location names to athome path segments; cities live under their prefecture
const LOCATIONS: &[(&str, &str)] = &[
    ("tokyo", "tokyo"),
    ("kanagawa", "kanagawa"),
    ("saitama", "saitama"),
    ("chiba", "chiba"),
    ("osaka", "osaka"),
    ("kyoto", "kyoto"),
    ("hyogo", "hyogo"),
    ("aichi", "aichi"),
    ("hokkaido", "hokkaido"),
    ("okayama", "okayama"),
    ("yokohama", "kanagawa/yokohamashi"),
    ("nagoya", "aichi/nagoyashi"),
    ("sapporo", "hokkaido/sapporoshi"),
    ("fukuoka", "fukuoka/fukuokashi"),
    ("kobe", "hyogo/kobeshi"),
];

/// Result-list wrappers that stay on the page when a search matches nothing
const RESULT_LISTS: &[&str] = &["#item-list", ".p-property-list", ".property-list"];

const DETAIL_LAYOUT: DetailLayout<'static> = DetailLayout {
    galleries: &[
        "#item-detail_photo img",
        ".photo-slider img",
        ".p-detail-photo img",
        "div.photoGallery img",
    ],
    descriptions: &[".p-detail-comment", "#item-detail_comment", ".comment"],
    features: &[".p-detail-equipment li", ".property-object-tag li"],
    tables: &["table.p-detail-table tr", "#item-detail_data tr", "table.dataTbl tr"],
};

pub struct AtHomeAdapter {
    base_url: Url,
}

impl AtHomeAdapter {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn boxed(base_url: Url) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(base_url))
    }

    fn location_path(location: &str) -> &'static str {
        LOCATIONS
            .iter()
            .find(|(name, _)| *name == location)
            .map(|(_, path)| *path)
            .unwrap_or("tokyo")
    }

    fn parse_object(
        &self,
        element: ElementRef<'_>,
        query: &SearchQuery,
    ) -> Result<Result<RawListingStub, String>, PageError> {
        let link = selector(NAME, ".property-object-title a[href]")?;
        let price = selector(NAME, ".property-object-price")?;
        let place = selector(NAME, ".property-object-place")?;
        let row = selector(NAME, ".property-object-detail li")?;
        let label = selector(NAME, ".object-label")?;
        let value = selector(NAME, ".object-value")?;
        let tags = selector(NAME, ".property-object-tag li")?;
        let thumb = selector(NAME, ".property-object-thumb img")?;

        let Some(anchor) = element.select(&link).next() else {
            return Ok(Err("property object has no title link".to_string()));
        };
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve(href, &self.base_url))
        else {
            return Ok(Err("property object link does not resolve".to_string()));
        };
        let Some(external_id) = html::external_id_from_url(&url, None) else {
            return Ok(Err(format!("cannot derive listing id from {}", url)));
        };

        let mut stub = RawListingStub::new(
            NAME,
            external_id,
            html::text_of(anchor),
            url,
            query.property_type,
        );
        stub.raw_price = first_text(element, &price);
        stub.raw_location = first_text(element, &place);
        for (label, value) in html::labelled_rows(element, &row, &label, &value) {
            fill_stub_field(&mut stub, &label, value);
        }
        stub.features = html::all_texts(element, &tags);
        stub.thumbnail_url = element
            .select(&thumb)
            .find_map(html::image_source)
            .and_then(|src| resolve(src, &self.base_url));

        Ok(Ok(stub))
    }
}

impl SiteAdapter for AtHomeAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn listing_page_url(&self, query: &SearchQuery, page: u32) -> Result<Url, PageError> {
        let section = match query.property_type {
            PropertyType::Rent => "chintai",
            PropertyType::Buy => "kodate",
        };
        let mut path = format!("{}/{}/list/", section, Self::location_path(&query.location));
        if page > 1 {
            path.push_str(&format!("page{}/", page));
        }
        join_path(&self.base_url, &path)
    }

    fn parse_listing_page(
        &self,
        html: &str,
        query: &SearchQuery,
    ) -> Result<ListingPage, PageError> {
        let document = Html::parse_document(html);
        let root = html::root(&document);
        let object = selector(NAME, ".property-object")?;

        let objects: Vec<ElementRef<'_>> = root.select(&object).collect();
        if objects.is_empty() {
            if html::is_empty_result(NAME, root, RESULT_LISTS)? {
                return Ok(ListingPage::default());
            }
            return Err(PageError::structure(NAME, "no .property-object blocks"));
        }

        let mut page = ListingPage::default();
        for element in objects {
            match self.parse_object(element, query)? {
                Ok(stub) => page.stubs.push(stub),
                Err(reason) => page.item_errors.push(reason),
            }
        }

        let next = selector(NAME, "li.next:not(.disabled) a[href]")?;
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

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="property-object">
    <div class="property-object-title"><a href="/chintai/6980123456/">グランドメゾン難波 502</a></div>
    <div class="property-object-price">8.2万円</div>
    <div class="property-object-place">大阪府大阪市浪速区</div>
    <ul class="property-object-detail">
      <li><span class="object-label">間取り：</span><span class="object-value">1DK</span></li>
      <li><span class="object-label">面積：</span><span class="object-value">30.5㎡</span></li>
      <li><span class="object-label">築年月：</span><span class="object-value">2010年4月</span></li>
      <li><span class="object-label">構造：</span><span class="object-value">RC</span></li>
      <li><span class="object-label">方角：</span><span class="object-value">南</span></li>
    </ul>
    <ul class="property-object-tag"><li>ペット可</li></ul>
    <div class="property-object-thumb"><img src="/img/blank.png" data-src="https://img.athome.jp/1.jpg"></div>
  </div>
  <div class="property-object"><div class="property-object-title">掲載終了</div></div>
  <ul class="pager"><li class="next disabled"><a href="/chintai/osaka/list/page2/">次へ</a></li></ul>
</body></html>"#;

    fn adapter() -> AtHomeAdapter {
        AtHomeAdapter::new(Url::parse("https://www.athome.co.jp/").unwrap())
    }

    #[test]
    fn test_listing_page_urls() {
        let query = SearchQuery::new("yokohama", PropertyType::Rent);
        assert_eq!(
            adapter().listing_page_url(&query, 1).unwrap().as_str(),
            "https://www.athome.co.jp/chintai/kanagawa/yokohamashi/list/"
        );
        assert_eq!(
            adapter().listing_page_url(&query, 4).unwrap().as_str(),
            "https://www.athome.co.jp/chintai/kanagawa/yokohamashi/list/page4/"
        );

        let buy = SearchQuery::new("okayama", PropertyType::Buy);
        assert_eq!(
            adapter().listing_page_url(&buy, 1).unwrap().as_str(),
            "https://www.athome.co.jp/kodate/okayama/list/"
        );
    }

    #[test]
    fn test_parse_listing_page() {
        let query = SearchQuery::new("osaka", PropertyType::Rent);
        let page = adapter().parse_listing_page(PAGE, &query).unwrap();

        assert_eq!(page.stubs.len(), 1);
        assert_eq!(page.item_errors.len(), 1);
        // the only next link is disabled
        assert!(!page.has_next);

        let stub = &page.stubs[0];
        assert_eq!(stub.external_id, "6980123456");
        assert_eq!(stub.title, "グランドメゾン難波 502");
        assert_eq!(stub.raw_layout.as_deref(), Some("1DK"));
        assert_eq!(stub.raw_size.as_deref(), Some("30.5㎡"));
        assert_eq!(stub.raw_year_built.as_deref(), Some("2010年4月"));
        assert_eq!(stub.raw_building_type.as_deref(), Some("RC"));
        assert_eq!(stub.features, vec!["ペット可"]);
        assert_eq!(
            stub.thumbnail_url.as_deref(),
            Some("https://img.athome.jp/1.jpg")
        );
    }

    #[test]
    fn test_next_page_detected() {
        let html = PAGE.replace("next disabled", "next");
        let query = SearchQuery::new("osaka", PropertyType::Rent);
        assert!(adapter().parse_listing_page(&html, &query).unwrap().has_next);
    }

    #[test]
    fn test_empty_search_result_is_a_last_page() {
        let query = SearchQuery::new("osaka", PropertyType::Rent);
        let page = adapter()
            .parse_listing_page(
                r#"<html><body><div id="item-list"></div></body></html>"#,
                &query,
            )
            .unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_unrecognized_page_is_structure_error() {
        let query = SearchQuery::new("osaka", PropertyType::Rent);
        assert!(matches!(
            adapter().parse_listing_page("<html><body><h1>Access denied</h1></body></html>", &query),
            Err(PageError::Structure { .. })
        ));
    }
}
