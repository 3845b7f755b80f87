//! Shared HTML extraction helpers for the site adapters
//!
//! Selectors are compiled per call; a malformed selector becomes a
//! [`PageError::Selector`] instead of a panic.

use crate::adapters::PageError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Attributes that may carry an image URL, in preference order
///
/// Lazy-loading galleries keep the real URL in a data attribute and put a
/// placeholder in `src`, so placeholders are skipped in favour of later
/// attributes.
pub const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-original", "data-lazy-src"];

/// Compiles a CSS selector
pub fn selector(adapter: &str, css: &str) -> Result<Selector, PageError> {
    Selector::parse(css).map_err(|e| PageError::Selector {
        adapter: adapter.to_string(),
        message: format!("'{}': {:?}", css, e),
    })
}

/// Compiles an ordered list of candidate selectors
pub fn selectors(adapter: &str, candidates: &[&str]) -> Result<Vec<Selector>, PageError> {
    candidates.iter().map(|css| selector(adapter, css)).collect()
}

/// Text content of an element with whitespace runs collapsed
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match, if it is non-empty
pub fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// Text of the first candidate selector that yields non-empty text
pub fn first_text_any(scope: ElementRef<'_>, candidates: &[Selector]) -> Option<String> {
    candidates.iter().find_map(|sel| first_text(scope, sel))
}

/// Non-empty texts of every match, in document order
pub fn all_texts(scope: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    scope
        .select(sel)
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Attribute of the first match
pub fn first_attr<'a>(scope: ElementRef<'a>, sel: &Selector, attr: &str) -> Option<&'a str> {
    scope
        .select(sel)
        .find_map(|element| element.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Best image URL carried by an `<img>` element
pub fn image_source<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty() && !is_placeholder(value))
}

fn is_placeholder(src: &str) -> bool {
    src.starts_with("data:") || src.ends_with("blank.png") || src.contains("loading")
}

/// Images from the first candidate selector that yields any
///
/// Gallery markup differs between page templates, so candidates are tried
/// in order and the first non-empty match wins.
pub fn collect_images(scope: ElementRef<'_>, candidates: &[Selector], base: &Url) -> Vec<String> {
    for sel in candidates {
        let images: Vec<String> = scope
            .select(sel)
            .filter_map(image_source)
            .filter_map(|src| resolve(src, base))
            .collect();

        if !images.is_empty() {
            return images;
        }
    }

    Vec::new()
}

/// Resolves an href against the page base
///
/// Returns None for empty hrefs, non-navigational schemes, and anything
/// that does not end up as http(s).
pub fn resolve(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Derives a source-local listing id from a listing URL
///
/// Prefers the given query parameter when present, otherwise the last
/// non-empty path segment.
pub fn external_id_from_url(url: &str, query_key: Option<&str>) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    if let Some(key) = query_key {
        let from_query = parsed
            .query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned());
        if from_query.is_some() {
            return from_query;
        }
    }

    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.trim_end_matches(".html").to_string())
        .filter(|segment| !segment.is_empty())
}

/// Which listing field a labelled detail row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Layout,
    Size,
    YearBuilt,
    BuildingType,
    Location,
    Price,
}

/// Maps a Japanese row label onto a listing field
pub fn classify_label(label: &str) -> Option<RowField> {
    let label = label.trim().trim_end_matches(['：', ':']);

    if label.contains("間取") {
        Some(RowField::Layout)
    } else if label.contains("面積") || label.contains("専有") {
        Some(RowField::Size)
    } else if label.contains("築年") {
        Some(RowField::YearBuilt)
    } else if label.contains("構造") || label.contains("種別") || label.contains("種目") {
        Some(RowField::BuildingType)
    } else if label.contains("所在地") || label.contains("住所") {
        Some(RowField::Location)
    } else if label.contains("賃料") || label.contains("価格") {
        Some(RowField::Price)
    } else {
        None
    }
}

/// (label, value) pairs from rows that hold a label cell and a value cell
pub fn labelled_rows(
    scope: ElementRef<'_>,
    row: &Selector,
    label: &Selector,
    value: &Selector,
) -> Vec<(String, String)> {
    scope
        .select(row)
        .filter_map(|element| {
            let label = first_text(element, label)?;
            let value = first_text(element, value)?;
            Some((label, value))
        })
        .collect()
}

/// (header, cell) pairs from property tables that put several th/td pairs in a row
pub fn table_pairs(scope: ElementRef<'_>, rows: &Selector) -> Vec<(String, String)> {
    let header = Selector::parse("th").ok();
    let cell = Selector::parse("td").ok();
    let (Some(header), Some(cell)) = (header, cell) else {
        return Vec::new();
    };

    scope
        .select(rows)
        .flat_map(|row| {
            let labels: Vec<String> = row.select(&header).map(text_of).collect();
            let values: Vec<String> = row.select(&cell).map(text_of).collect();
            labels.into_iter().zip(values).collect::<Vec<_>>()
        })
        .filter(|(label, value)| !label.is_empty() && !value.is_empty())
        .collect()
}

/// Notices the sources print in place of a result list
const NO_RESULT_NOTICES: &[&str] = &[
    "該当する物件はありません",
    "該当する物件がありません",
    "該当物件はありません",
    "条件に一致する物件はありません",
    "条件に合う物件が見つかりませんでした",
    "物件が見つかりませんでした",
    "No properties found",
    "No results found",
];

/// True when the page is a search result that legitimately lists nothing
///
/// Either a result-list wrapper from `result_lists` is present (with no
/// listing blocks inside, which the caller has already established), or the
/// page prints a known no-results notice. Anything else is an unrecognized
/// page.
pub fn is_empty_result(
    adapter: &str,
    scope: ElementRef<'_>,
    result_lists: &[&str],
) -> Result<bool, PageError> {
    for sel in selectors(adapter, result_lists)? {
        if scope.select(&sel).next().is_some() {
            return Ok(true);
        }
    }

    let text = text_of(scope);
    Ok(NO_RESULT_NOTICES.iter().any(|notice| text.contains(notice)))
}

/// Document root as an element, so documents and fragments share helpers
pub fn root(document: &Html) -> ElementRef<'_> {
    document.root_element()
}
