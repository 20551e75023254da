//! Percent-decoding of map URLs and extraction of coordinate-bearing and
//! label-bearing parts.
//!
//! Decoding never fails: malformed escapes are kept verbatim, so a URL with
//! broken encoding just yields fewer matches.

use std::borrow::Cow;
use std::sync::LazyLock;

use maplink_core::{Coordinate, DomainTable, PlaceLabel};
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::pattern;

static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("valid regex"));

static PAIR_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@?(-?\d{1,3}\.\d+)\s*,\s*(-?\d{1,3}\.\d+)\s*$").expect("valid regex")
});

/// Query parameters whose non-coordinate values are free-text place queries.
const TEXT_PARAMS: [&str; 3] = ["q", "query", "destination"];

/// A map URL split into its decoded parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedUrl {
    /// Path with percent escapes decoded.
    pub path: String,
    /// Query parameters in source order.
    pub params: Vec<(String, String)>,
    pub fragment: Option<String>,
    /// Decoded bodies of `data=` path segments.
    pub data_segments: Vec<String>,
}

impl DecodedUrl {
    /// First value of parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every decoded text that may carry a coordinate, in URL order.
    fn texts(&self) -> impl Iterator<Item = &str> {
        self.data_segments
            .iter()
            .map(String::as_str)
            .chain(self.params.iter().map(|(_, v)| v.as_str()))
            .chain(self.fragment.as_deref())
    }
}

/// Splits and decodes `url`. `+` in the query is a space; a value that still
/// holds escapes after one pass (a nested URL) is decoded once more.
#[must_use]
pub fn decode_url(url: &str) -> DecodedUrl {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, frag)) => (rest, Some(decode_nested(frag, false))),
        None => (url, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_nested(key, true), decode_nested(value, true))
        })
        .collect();

    let data_segments = path
        .split('/')
        .filter_map(|segment| segment.strip_prefix("data="))
        .map(|data| decode_nested(data, false))
        .collect();

    DecodedUrl {
        path: decode_once(path, false),
        params,
        fragment,
        data_segments,
    }
}

fn decode_once(raw: &str, plus_is_space: bool) -> String {
    if plus_is_space && raw.contains('+') {
        percent_decode_str(&raw.replace('+', " "))
            .decode_utf8_lossy()
            .into_owned()
    } else {
        percent_decode_str(raw).decode_utf8_lossy().into_owned()
    }
}

fn decode_nested(raw: &str, plus_is_space: bool) -> String {
    let first = decode_once(raw, plus_is_space);
    if ESCAPE.is_match(&first) {
        decode_once(&first, false)
    } else {
        first
    }
}

/// The coordinate the decoded-params strategy reports for `url`.
///
/// Parameter values that are exactly `lat,lon` match directly. Otherwise each
/// decoded part is scanned for structural markers in URL order.
#[must_use]
pub fn find_in_decoded(url: &str) -> Option<Coordinate> {
    let decoded = decode_url(url);

    let direct = decoded.params.iter().find_map(|(_, value)| {
        let caps = PAIR_VALUE.captures(value)?;
        Coordinate::parse_pair(&caps[1], &caps[2])
    });
    if direct.is_some() {
        return direct;
    }

    let found = decoded.texts().find_map(|text| {
        pattern::structural_candidates(text)
            .first()
            .map(|m| m.coordinate)
    });
    found
}

/// If `url` is a consent interstitial carrying a `continue` target, the
/// decoded target; otherwise `url` unchanged.
#[must_use]
pub fn strip_consent<'a>(url: &'a str, table: &DomainTable) -> Cow<'a, str> {
    if !host_of(url).is_some_and(|host| table.is_consent_host(host)) {
        return Cow::Borrowed(url);
    }
    match decode_url(url).param("continue") {
        Some(target) if target.starts_with("http") => Cow::Owned(target.to_owned()),
        _ => Cow::Borrowed(url),
    }
}

/// Host part of an absolute URL, without port or credentials.
#[must_use]
pub fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

/// Decoded place text of `url`: the `/place/<text>/` segment or, failing
/// that, a free-text `q`/`query`/`destination` parameter.
#[must_use]
pub fn place_segment(url: &str) -> Option<String> {
    let raw_path = url.split(['?', '#']).next().unwrap_or_default();
    let from_segment = raw_path
        .split_once("/place/")
        .map(|(_, rest)| rest.split('/').next().unwrap_or_default())
        .filter(|segment| !segment.is_empty())
        .map(|segment| decode_nested(segment, true));

    let text = from_segment.or_else(|| {
        let decoded = decode_url(url);
        TEXT_PARAMS.iter().find_map(|name| {
            decoded
                .param(name)
                .filter(|v| !PAIR_VALUE.is_match(v) && pattern::find_candidates(v).is_empty())
                .map(str::to_owned)
        })
    })?;

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Display label for `url`: the first comma-separated part of its place text
/// when that part is more than two characters and not all digits.
#[must_use]
pub fn place_label(url: &str) -> Option<PlaceLabel> {
    let text = place_segment(url)?;
    let head = text.split(',').next()?.trim();
    let all_digits = head
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| c.is_ascii_digit());
    if head.chars().count() <= 2 || all_digits {
        return None;
    }
    PlaceLabel::new(head).ok()
}

/// Every way `url` can yield a coordinate without network access: consent
/// unwrapping, raw markers, then decoded parts.
#[must_use]
pub fn coordinate_in_url(url: &str, table: &DomainTable) -> Option<Coordinate> {
    let target = strip_consent(url, table);
    pattern::first_coordinate(&target).or_else(|| find_in_decoded(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_params_and_fragment() {
        let d = decode_url("https://x/maps?q=Cafe+Luso%2C+Lisboa&hl=pt#frag%20one");
        assert_eq!(d.param("q"), Some("Cafe Luso, Lisboa"));
        assert_eq!(d.param("hl"), Some("pt"));
        assert_eq!(d.fragment.as_deref(), Some("frag one"));
    }

    #[test]
    fn malformed_escape_is_left_verbatim() {
        let d = decode_url("https://x/maps?q=100%zz+off&ll=%E2%28");
        assert_eq!(d.param("q"), Some("100%zz off"));
        assert!(d.param("ll").is_some());
        assert_eq!(find_in_decoded("https://x/maps?q=%4"), None);
    }

    #[test]
    fn nested_continue_target_is_decoded_twice() {
        let url = "https://consent.google.com/ml?continue=https%3A%2F%2Fwww.google.com%2Fmaps%2Fplace%2FCafe%2F%254038.7223%252C-9.1393%252C17z&gl=PT";
        let c = find_in_decoded(url).unwrap();
        assert_eq!(c.to_string(), "38.7223,-9.1393");
    }

    #[test]
    fn direct_pair_value_matches() {
        let c = find_in_decoded("https://www.google.com/maps?ll=38.7223,-9.1393&z=15").unwrap();
        assert_eq!(c.to_string(), "38.7223,-9.1393");
        let c = find_in_decoded("https://www.google.com/maps?daddr=%4041.15,-8.61").unwrap();
        assert_eq!(c.to_string(), "41.15,-8.61");
    }

    #[test]
    fn data_segment_bang_marker_after_decoding() {
        let url = "https://www.google.com/maps/place/X/data=%213d41.1579%214d-8.6291";
        assert_eq!(find_in_decoded(url).unwrap().to_string(), "41.1579,-8.6291");
    }

    #[test]
    fn strip_consent_returns_target_only_for_consent_host() {
        let table = DomainTable::default();
        let url = "https://consent.google.com/ml?continue=https://www.google.com/maps/place/X&gl=PT";
        assert_eq!(
            strip_consent(url, &table),
            "https://www.google.com/maps/place/X"
        );
        let plain = "https://www.google.com/maps?continue=https://evil.example";
        assert_eq!(strip_consent(plain, &table), plain);
    }

    #[test]
    fn host_of_strips_port_and_userinfo() {
        assert_eq!(host_of("http://127.0.0.1:8080/a"), Some("127.0.0.1"));
        assert_eq!(host_of("https://u:p@maps.google.de?x"), Some("maps.google.de"));
        assert_eq!(host_of("no-scheme/path"), None);
    }

    #[test]
    fn place_label_takes_first_comma_part() {
        let url = "https://www.google.com/maps/place/Oceanário+de+Lisboa,+Esplanada+Dom+Carlos+I/@38.76,-9.09,17z";
        assert_eq!(
            place_label(url).unwrap().as_str(),
            "Oceanário de Lisboa"
        );
        let encoded = "https://www.google.com/maps/place/Ocean%C3%A1rio+de+Lisboa/@38.76,-9.09,17z";
        assert_eq!(place_label(encoded).unwrap().as_str(), "Oceanário de Lisboa");
    }

    #[test]
    fn place_label_rejects_short_and_numeric_heads() {
        assert_eq!(place_label("https://x/maps/place/AB,+Lisboa/"), None);
        assert_eq!(place_label("https://x/maps/place/1200+195,+Lisboa/"), None);
    }

    #[test]
    fn place_segment_falls_back_to_free_text_query() {
        assert_eq!(
            place_segment("https://www.google.com/maps?q=Restaurant+Name,+Lisbon").as_deref(),
            Some("Restaurant Name, Lisbon")
        );
        assert_eq!(place_segment("https://www.google.com/maps?q=38.7,-9.1"), None);
        assert_eq!(place_segment("https://maps.app.goo.gl/XodKRcb7kt53ne8d9"), None);
    }

    #[test]
    fn coordinate_in_url_unwraps_consent_first() {
        let table = DomainTable::default();
        let url = "https://consent.google.com/ml?continue=https://www.google.com/maps/@40.4168,-3.7038,12z";
        assert_eq!(
            coordinate_in_url(url, &table).unwrap().to_string(),
            "40.4168,-3.7038"
        );
    }
}
