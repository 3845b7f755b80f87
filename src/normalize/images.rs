//! Image list cleaning and quality thresholds

use std::collections::HashSet;
use url::Url;

/// URL fragments that identify spinners, icons and layout filler
const REJECTED_PATTERNS: &[&str] = &[
    "loading",
    "utility/loading",
    "icon_",
    "icon_visited",
    "icon_sokunyu",
    "blank.png",
    "spacer",
];

/// Cleans a raw image list
///
/// Drops placeholders and GIFs, upgrades `smallimg` thumbnail proxies to the
/// original image named by their `file` parameter, and removes duplicates
/// while keeping first-seen order.
pub fn clean_images<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();

    for candidate in candidates {
        let Some(url) = clean_image(&candidate) else {
            continue;
        };
        if seen.insert(url.clone()) {
            cleaned.push(url);
        }
    }

    cleaned
}

fn clean_image(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }

    let absolute = if raw.starts_with("//") {
        format!("https:{}", raw)
    } else {
        raw.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    let url = upgrade_thumbnail(url);

    if !matches!(url.scheme(), "http" | "https") || is_rejected(&url) {
        return None;
    }

    Some(url.to_string())
}

fn upgrade_thumbnail(url: Url) -> Url {
    if !url.as_str().contains("smallimg") {
        return url;
    }

    let original = url
        .query_pairs()
        .find(|(key, _)| key == "file")
        .and_then(|(_, file)| Url::parse(&file).ok());
    original.unwrap_or(url)
}

fn is_rejected(url: &Url) -> bool {
    let lowered = url.as_str().to_lowercase();
    if REJECTED_PATTERNS.iter().any(|pattern| lowered.contains(pattern)) {
        return true;
    }
    url.path().to_lowercase().ends_with(".gif")
}

/// Width advertised by `w=` or `width=` query parameters
pub fn width_hint(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    let hint = parsed
        .query_pairs()
        .find(|(key, _)| key == "w" || key == "width")
        .and_then(|(_, value)| value.parse::<u32>().ok());
    hint.filter(|width| *width > 0)
}

/// Number of images that satisfy the width threshold
///
/// Images without a width hint are counted as satisfying it.
pub fn qualifying_count(images: &[String], min_width: Option<u32>) -> usize {
    match min_width {
        None => images.len(),
        Some(min) => images
            .iter()
            .filter(|url| width_hint(url).map_or(true, |width| width >= min))
            .count(),
    }
}
