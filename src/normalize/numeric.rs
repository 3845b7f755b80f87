//! Numeric coercion of raw listing text
//!
//! Every parser returns `None` for absent or unparseable input; nothing here
//! fails loudly.

/// Square meters per tsubo
pub const SQM_PER_TSUBO: f64 = 3.305785;

const MAN: f64 = 10_000.0;
const OKU: f64 = 100_000_000.0;

/// Range separators; a range resolves to its first value
const RANGE_SEPARATORS: &[char] = &['～', '〜', '~'];

/// Folds full-width digits and punctuation to ASCII
pub fn to_ascii_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '，' => ',',
            '．' => '.',
            '　' => ' ',
            _ => c,
        })
        .collect()
}

fn first_of_range(text: &str) -> &str {
    text.split(RANGE_SEPARATORS).next().unwrap_or(text)
}

/// Parses a number written with locale-dependent separators
///
/// When both `,` and `.` appear, the one that comes last is the decimal
/// separator. A lone separator kind is a thousands separator when every
/// group after it has exactly three digits and, for `.`, it occurs more
/// than once.
pub fn parse_decimal(token: &str) -> Option<f64> {
    let token = token.trim();
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let last_comma = token.rfind(',');
    let last_dot = token.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(_), None) => {
            if thousands_groups(token, ',') {
                token.replace(',', "")
            } else if token.matches(',').count() == 1 {
                token.replace(',', ".")
            } else {
                return None;
            }
        }
        (None, Some(_)) => {
            let dots = token.matches('.').count();
            if dots == 1 {
                token.to_string()
            } else if thousands_groups(token, '.') {
                token.replace('.', "")
            } else {
                return None;
            }
        }
        (None, None) => token.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn thousands_groups(token: &str, separator: char) -> bool {
    let mut groups = token.split(separator);
    let head = groups.next().unwrap_or("");
    !head.is_empty() && head.len() <= 3 && groups.all(|group| group.len() == 3)
}

/// First run of digits and separators in `text` that contains a digit
fn first_number_token(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(rest.len());
    Some(rest[..end].trim_end_matches([',', '.']))
}

/// Parses a price into yen
///
/// Handles `¥15,000,000`, `15,000円`, the myriad units `万` and `億`
/// (`1,500万円`, `1億2000万円`, `12.5万円`), and ranges (`8万～9万円`).
///
/// ```
/// use japanhouse_ingest::normalize::parse_price;
///
/// assert_eq!(parse_price("¥15,000,000"), Some(15_000_000));
/// assert_eq!(parse_price("1億2000万円"), Some(120_000_000));
/// assert_eq!(parse_price("応相談"), None);
/// ```
pub fn parse_price(raw: &str) -> Option<i64> {
    let ascii = to_ascii_digits(raw);
    let text = first_of_range(&ascii);

    let yen = if text.contains('億') || text.contains('万') {
        parse_myriad(text)?
    } else {
        parse_decimal(first_number_token(text)?)?
    };

    if yen < 0.0 {
        return None;
    }
    Some(yen.round() as i64)
}

fn parse_myriad(text: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut rest = text;
    let mut matched = false;

    if let Some((oku, after)) = rest.split_once('億') {
        total += parse_decimal(first_number_token(oku)?)? * OKU;
        rest = after;
        matched = true;
    }

    if let Some((man, after)) = rest.split_once('万') {
        if let Some(token) = first_number_token(man) {
            total += parse_decimal(token)? * MAN;
            matched = true;
        }
        rest = after;
    }

    if let Some(token) = first_number_token(rest) {
        total += parse_decimal(token)?;
        matched = true;
    }

    matched.then_some(total)
}

/// Parses a floor area into square meters
///
/// Accepts `m²`, `㎡`, `m2`, `平米` and `sqm`; a bare number is taken as
/// square meters. `坪` converts at [`SQM_PER_TSUBO`], rounded to 0.01.
pub fn parse_area(raw: &str) -> Option<f64> {
    let ascii = to_ascii_digits(raw);
    let text = first_of_range(&ascii);
    let token = first_number_token(text)?;
    let value = parse_decimal(token)?;

    let after = &text[text.find(token).map(|i| i + token.len()).unwrap_or(0)..];
    if after.trim_start().starts_with('坪') {
        return Some((value * SQM_PER_TSUBO * 100.0).round() / 100.0);
    }

    Some(value)
}

/// Parses a construction year into a Gregorian year
///
/// Accepts `1998年3月`, `1998` and era forms (`昭和55年`, `平成元年`,
/// `令和2年`). Ages such as `築12年` or `新築` name no year on their own
/// and are unspecified, so the result never depends on when the page was
/// read.
pub fn parse_year(raw: &str) -> Option<i32> {
    let text = to_ascii_digits(raw);
    let text = text.trim();

    for (era, offset) in [("令和", 2018), ("平成", 1988), ("昭和", 1925), ("大正", 1911)] {
        if let Some(index) = text.find(era) {
            let after = &text[index + era.len()..];
            if after.starts_with('元') {
                return Some(offset + 1);
            }
            let year: i32 = leading_digits(after)?.parse().ok()?;
            return (year > 0).then_some(offset + year);
        }
    }

    let mut rest = text;
    while let Some(start) = rest.find(|c: char| c.is_ascii_digit()) {
        let digits = leading_digits(&rest[start..])?;
        if digits.len() == 4 {
            if let Ok(year) = digits.parse::<i32>() {
                if (1800..=2100).contains(&year) {
                    return Some(year);
                }
            }
        }
        rest = &rest[start + digits.len()..];
    }

    None
}

fn leading_digits(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    (end > 0).then(|| &text[..end])
}
