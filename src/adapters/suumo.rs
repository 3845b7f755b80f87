//! SUUMO (suumo.jp)
//!
//! Rent searches return building cassettes with one row per vacant room;
//! every room becomes its own stub. Buy searches return one `property_unit`
//! block per property.

use crate::adapters::html::{self, first_text, image_source, resolve, selector, text_of};
use crate::adapters::{
    join_path, parse_detail_with, DetailLayout, ListingPage, PageError, SearchQuery, SiteAdapter,
};
use crate::listing::{DetailRecord, PropertyType, RawListingStub};
use scraper::{ElementRef, Html};
use url::Url;

const NAME: &str = "suumo";

/// (location, region code `ar`, prefecture code `ta`)
const LOCATIONS: &[(&str, &str, &str)] = &[
    ("tokyo", "030", "13"),
    ("kanagawa", "030", "14"),
    ("saitama", "030", "11"),
    ("chiba", "030", "12"),
    ("osaka", "060", "27"),
    ("kyoto", "060", "26"),
    ("hyogo", "060", "28"),
    ("aichi", "050", "23"),
    ("fukuoka", "090", "40"),
    ("hokkaido", "010", "01"),
    ("okayama", "080", "33"),
];

/// Result-list wrappers that stay on the page when a search matches nothing
const RESULT_LISTS: &[&str] = &["#js-bukkenList", ".l-cassetteitem", "#js-searchResult"];

const DETAIL_LAYOUT: DetailLayout<'static> = DetailLayout {
    galleries: &[
        "#js-view_gallery-list img",
        ".property_view_gallery img",
        ".property_view_main-photo img",
        "div.detailGallery img",
    ],
    descriptions: &[
        "#js-detail-comment",
        ".property_view_note-info",
        ".bukkenComment",
    ],
    features: &["#bkdt-option li", ".property_view_option li", ".bukken-option li"],
    tables: &["table.data_table tr", ".property_view_table tr", "table.bukken_table tr"],
};

pub struct SuumoAdapter {
    base_url: Url,
}

impl SuumoAdapter {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn boxed(base_url: Url) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(base_url))
    }

    /// Region and prefecture codes; unknown locations search Tokyo
    fn codes(location: &str) -> (&'static str, &'static str) {
        LOCATIONS
            .iter()
            .find(|(name, _, _)| *name == location)
            .map(|(_, ar, ta)| (*ar, *ta))
            .unwrap_or(("030", "13"))
    }

    /// Returns false when the search legitimately matched nothing
    fn parse_rent(&self, root: ElementRef<'_>, page: &mut ListingPage) -> Result<bool, PageError> {
        let cassette = selector(NAME, ".cassetteitem")?;
        let title = selector(NAME, ".cassetteitem_content-title")?;
        let label = selector(NAME, ".cassetteitem_content-label")?;
        let address = selector(NAME, ".cassetteitem_detail-col1")?;
        let building_info = selector(NAME, ".cassetteitem_detail-col3 div")?;
        let thumbnail = selector(NAME, ".cassetteitem_object-item img")?;
        let room = selector(NAME, ".cassetteitem_detail-room")?;
        let link = selector(NAME, "a[href]")?;
        let rent = selector(NAME, ".cassetteitem_price--rent")?;
        let layout = selector(NAME, ".cassetteitem_madori")?;
        let size = selector(NAME, ".cassetteitem_menseki")?;

        let cassettes: Vec<ElementRef<'_>> = root.select(&cassette).collect();
        if cassettes.is_empty() {
            if html::is_empty_result(NAME, root, RESULT_LISTS)? {
                return Ok(false);
            }
            return Err(PageError::structure(NAME, "no .cassetteitem blocks"));
        }

        for building in cassettes {
            let building_name = first_text(building, &title).unwrap_or_default();
            let location = first_text(building, &address);
            let building_type = first_text(building, &label);
            let thumbnail_url = building
                .select(&thumbnail)
                .find_map(image_source)
                .and_then(|src| resolve(src, &self.base_url));

            // col3 holds "築N年" followed by the floor count
            let info: Vec<String> = building.select(&building_info).map(text_of).collect();
            let year_built = info.iter().find(|text| text.contains('築')).cloned();
            let floors: Vec<String> = info
                .iter()
                .filter(|text| text.contains("階建"))
                .cloned()
                .collect();

            for (index, room_row) in building.select(&room).enumerate() {
                let Some(url) = html::first_attr(room_row, &link, "href")
                    .and_then(|href| resolve(href, &self.base_url))
                else {
                    page.item_errors.push(format!(
                        "room {} of '{}' has no detail link",
                        index + 1,
                        building_name
                    ));
                    continue;
                };

                let Some(external_id) = html::external_id_from_url(&url, Some("bc")) else {
                    page.item_errors
                        .push(format!("cannot derive listing id from {}", url));
                    continue;
                };

                let mut stub = RawListingStub::new(
                    NAME,
                    external_id,
                    building_name.clone(),
                    url,
                    PropertyType::Rent,
                );
                stub.raw_price = first_text(room_row, &rent);
                stub.raw_layout = first_text(room_row, &layout);
                stub.raw_size = first_text(room_row, &size);
                stub.raw_location = location.clone();
                stub.raw_year_built = year_built.clone();
                stub.raw_building_type = building_type.clone();
                stub.thumbnail_url = thumbnail_url.clone();
                stub.features = floors.clone();
                page.stubs.push(stub);
            }
        }

        Ok(true)
    }

    fn parse_buy(&self, root: ElementRef<'_>, page: &mut ListingPage) -> Result<bool, PageError> {
        let unit = selector(NAME, ".property_unit")?;
        let link = selector(NAME, ".property_unit-link")?;
        let title = selector(NAME, ".property_unit-title")?;
        let price = selector(NAME, ".dottable-value--price")?;
        let address = selector(NAME, ".dottable-value--address")?;
        let size = selector(NAME, ".dottable-value--menseki")?;
        let layout = selector(NAME, ".dottable-value--madori")?;
        let year = selector(NAME, ".dottable-value--chikunengetsu")?;
        let thumbnail = selector(
            NAME,
            ".property_unit-thumbnail-image, .property_unit-thumbnail-image img",
        )?;

        let units: Vec<ElementRef<'_>> = root.select(&unit).collect();
        if units.is_empty() {
            if html::is_empty_result(NAME, root, RESULT_LISTS)? {
                return Ok(false);
            }
            return Err(PageError::structure(NAME, "no .property_unit blocks"));
        }

        for (index, element) in units.into_iter().enumerate() {
            let Some(url) = html::first_attr(element, &link, "href")
                .and_then(|href| resolve(href, &self.base_url))
            else {
                page.item_errors
                    .push(format!("property unit {} has no link", index + 1));
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
                first_text(element, &title).unwrap_or_default(),
                url,
                PropertyType::Buy,
            );
            stub.raw_price = first_text(element, &price);
            stub.raw_location = first_text(element, &address);
            stub.raw_size = first_text(element, &size);
            stub.raw_layout = first_text(element, &layout);
            stub.raw_year_built = first_text(element, &year);
            stub.thumbnail_url = element
                .select(&thumbnail)
                .find_map(image_source)
                .and_then(|src| resolve(src, &self.base_url));
            page.stubs.push(stub);
        }

        Ok(true)
    }

    fn has_next(&self, root: ElementRef<'_>) -> Result<bool, PageError> {
        let next = selector(
            NAME,
            ".pagination-parts--next[href], .pagination-parts--next a[href]",
        )?;
        if root.select(&next).next().is_some() {
            return Ok(true);
        }

        // Newer templates only label the link
        let parts = selector(NAME, ".pagination-parts a[href]")?;
        Ok(root.select(&parts).any(|a| text_of(a).contains("次へ")))
    }
}

impl SiteAdapter for SuumoAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn listing_page_url(&self, query: &SearchQuery, page: u32) -> Result<Url, PageError> {
        let (ar, ta) = Self::codes(&query.location);
        let (path, bs) = match query.property_type {
            PropertyType::Rent => ("jj/chintai/ichiran/FR301FC001/", "040"),
            PropertyType::Buy => ("jj/bukken/ichiran/JJ010FJ001/", "021"),
        };

        let mut url = join_path(&self.base_url, path)?;
        url.query_pairs_mut()
            .append_pair("ar", ar)
            .append_pair("bs", bs)
            .append_pair("ta", ta)
            .append_pair("pn", &page.to_string());
        Ok(url)
    }

    fn parse_listing_page(
        &self,
        html: &str,
        query: &SearchQuery,
    ) -> Result<ListingPage, PageError> {
        let document = Html::parse_document(html);
        let root = html::root(&document);
        let mut page = ListingPage::default();

        let found = match query.property_type {
            PropertyType::Rent => self.parse_rent(root, &mut page)?,
            PropertyType::Buy => self.parse_buy(root, &mut page)?,
        };
        if !found {
            return Ok(page);
        }

        page.has_next = self.has_next(root)?;
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

    const RENT_PAGE: &str = r#"
<html><body>
  <div class="cassetteitem">
    <div class="cassetteitem_content-label"><span>賃貸マンション</span></div>
    <div class="cassetteitem_content-title">パークハイツ新宿</div>
    <div class="cassetteitem_object-item"><img src="/img/loading.gif" rel="https://img01.suumo.com/front/gazo/bukken/100/a.jpg"></div>
    <ul>
      <li class="cassetteitem_detail-col1">東京都新宿区西新宿3</li>
      <li class="cassetteitem_detail-col3"><div>築12年</div><div>14階建</div></li>
    </ul>
    <table>
      <tr class="cassetteitem_detail-room">
        <td><span class="cassetteitem_price--rent">12.5万円</span></td>
        <td><span class="cassetteitem_madori">1LDK</span><span class="cassetteitem_menseki">40.12m2</span></td>
        <td><a href="/chintai/jnc_000011111111/?bc=100011111111">詳細を見る</a></td>
      </tr>
      <tr class="cassetteitem_detail-room">
        <td><span class="cassetteitem_price--rent">9.8万円</span></td>
        <td><span class="cassetteitem_madori">1K</span><span class="cassetteitem_menseki">25m2</span></td>
        <td><a href="/chintai/jnc_000022222222/?bc=100022222222">詳細を見る</a></td>
      </tr>
      <tr class="cassetteitem_detail-room">
        <td><span class="cassetteitem_price--rent">8万円</span></td>
      </tr>
    </table>
  </div>
  <div class="pagination-parts"><a href="/jj/chintai/ichiran/FR301FC001/?pn=2">次へ</a></div>
</body></html>"#;

    const BUY_PAGE: &str = r#"
<html><body>
  <div class="property_unit">
    <a class="property_unit-link" href="/ms/chuko/tokyo/sc_shinjuku/nc_75123456/">
      <h2 class="property_unit-title">中古マンション 西新宿</h2>
    </a>
    <span class="dottable-value--price">4980万円</span>
    <span class="dottable-value--address">東京都新宿区西新宿</span>
    <span class="dottable-value--menseki">65.3m2（壁芯）</span>
    <span class="dottable-value--madori">3LDK</span>
    <span class="dottable-value--chikunengetsu">2004年3月</span>
    <img class="property_unit-thumbnail-image" src="https://img01.suumo.com/a.jpg">
  </div>
</body></html>"#;

    fn adapter() -> SuumoAdapter {
        SuumoAdapter::new(Url::parse("https://suumo.jp/").unwrap())
    }

    #[test]
    fn test_listing_page_url() {
        let query = SearchQuery::new("okayama", PropertyType::Buy);
        let url = adapter().listing_page_url(&query, 3).unwrap();
        assert_eq!(
            url.as_str(),
            "https://suumo.jp/jj/bukken/ichiran/JJ010FJ001/?ar=080&bs=021&ta=33&pn=3"
        );
    }

    #[test]
    fn test_unknown_location_falls_back_to_tokyo() {
        let query = SearchQuery::new("atlantis", PropertyType::Rent);
        let url = adapter().listing_page_url(&query, 1).unwrap();
        assert!(url.as_str().contains("ta=13"));
    }

    #[test]
    fn test_parse_rent_page_one_stub_per_room() {
        let query = SearchQuery::new("tokyo", PropertyType::Rent);
        let page = adapter().parse_listing_page(RENT_PAGE, &query).unwrap();

        assert_eq!(page.stubs.len(), 2);
        assert_eq!(page.item_errors.len(), 1);
        assert!(page.has_next);

        let first = &page.stubs[0];
        assert_eq!(first.external_id, "100011111111");
        assert_eq!(first.title, "パークハイツ新宿");
        assert_eq!(first.raw_price.as_deref(), Some("12.5万円"));
        assert_eq!(first.raw_layout.as_deref(), Some("1LDK"));
        assert_eq!(first.raw_size.as_deref(), Some("40.12m2"));
        assert_eq!(first.raw_location.as_deref(), Some("東京都新宿区西新宿3"));
        assert_eq!(first.raw_year_built.as_deref(), Some("築12年"));
        assert_eq!(first.raw_building_type.as_deref(), Some("賃貸マンション"));
        assert_eq!(first.features, vec!["14階建".to_string()]);
        assert_eq!(
            first.url,
            "https://suumo.jp/chintai/jnc_000011111111/?bc=100011111111"
        );
        assert_eq!(page.stubs[1].external_id, "100022222222");
    }

    #[test]
    fn test_parse_buy_page() {
        let query = SearchQuery::new("tokyo", PropertyType::Buy);
        let page = adapter().parse_listing_page(BUY_PAGE, &query).unwrap();

        assert_eq!(page.stubs.len(), 1);
        assert!(!page.has_next);
        let stub = &page.stubs[0];
        assert_eq!(stub.external_id, "nc_75123456");
        assert_eq!(stub.title, "中古マンション 西新宿");
        assert_eq!(stub.raw_price.as_deref(), Some("4980万円"));
        assert_eq!(stub.raw_year_built.as_deref(), Some("2004年3月"));
        assert_eq!(
            stub.thumbnail_url.as_deref(),
            Some("https://img01.suumo.com/a.jpg")
        );
    }

    #[test]
    fn test_page_without_cassettes_is_structure_error() {
        let query = SearchQuery::new("tokyo", PropertyType::Rent);
        let result = adapter().parse_listing_page("<html><body><p>メンテナンス中</p></body></html>", &query);
        assert!(matches!(result, Err(PageError::Structure { .. })));
    }

    #[test]
    fn test_empty_search_result_is_a_last_page() {
        let query = SearchQuery::new("tokyo", PropertyType::Rent);
        let page = adapter()
            .parse_listing_page(
                r#"<html><body><div id="js-bukkenList"></div>
                   <p class="error_pop-txt">該当する物件がありません</p></body></html>"#,
                &query,
            )
            .unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_next);

        let query = SearchQuery::new("tokyo", PropertyType::Buy);
        let page = adapter()
            .parse_listing_page(
                "<html><body><p>条件に一致する物件はありません</p></body></html>",
                &query,
            )
            .unwrap();
        assert!(page.stubs.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn test_parse_detail_page() {
        let stub = RawListingStub::new(
            NAME,
            "100011111111",
            "パークハイツ新宿",
            "https://suumo.jp/chintai/jnc_000011111111/",
            PropertyType::Rent,
        );
        let html = r#"
<html><body>
  <ul id="js-view_gallery-list">
    <li><img src="https://img01.suumo.com/gazo/1.jpg"></li>
    <li><img data-src="https://img01.suumo.com/gazo/2.jpg" src="data:image/gif;base64,R0lGOD"></li>
  </ul>
  <div id="js-detail-comment">南向き 角部屋</div>
  <ul id="bkdt-option"><li>バストイレ別</li><li>オートロック</li></ul>
  <table class="data_table">
    <tr><th>構造</th><td>鉄筋コン</td><th>築年数</th><td>築12年</td></tr>
  </table>
</body></html>"#;

        let record = adapter().parse_detail_page(html, &stub).unwrap();
        assert_eq!(record.external_id, "100011111111");
        assert_eq!(record.images.len(), 2);
        assert_eq!(record.description.as_deref(), Some("南向き 角部屋"));
        assert_eq!(record.features, vec!["バストイレ別", "オートロック"]);
        assert_eq!(record.raw_building_type.as_deref(), Some("鉄筋コン"));
        assert_eq!(record.raw_year_built.as_deref(), Some("築12年"));
    }

    #[test]
    fn test_empty_detail_page_is_structure_error() {
        let stub = RawListingStub::new(NAME, "1", "t", "https://suumo.jp/x/1/", PropertyType::Rent);
        assert!(adapter()
            .parse_detail_page("<html><body></body></html>", &stub)
            .is_err());
    }
}
