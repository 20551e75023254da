//! Coordinate markers embedded in map URLs and rendered documents.
//!
//! Structural markers (`/@lat,lon,`, coordinate query parameters, the
//! `!3d..!4d..` data segment) are scanned together and the leftmost valid one
//! wins. A bare `lat,lon` pair is only considered when no structural marker is
//! present anywhere in the text.

use std::sync::LazyLock;

use maplink_core::Coordinate;
use regex::Regex;

static AT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/@(-?\d{1,3}\.\d+),(-?\d{1,3}\.\d+)(?:[,/?#]|$)").expect("valid regex")
});

static QUERY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&](?:q|query|ll|center)=@?(-?\d{1,3}\.\d+)(?:,|%2[Cc]|\+|\s)+(-?\d{1,3}\.\d+)")
        .expect("valid regex")
});

static BANG_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?\d{1,3}\.\d+)!4d(-?\d{1,3}\.\d+)").expect("valid regex"));

static LOOSE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.\-])@?(-?\d{1,3}\.\d{3,}),\s?(-?\d{1,3}\.\d{3,})").expect("valid regex")
});

static PLACE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1s(0x[0-9a-fA-F]+):(0x[0-9a-fA-F]+)").expect("valid regex")
});

/// Which marker produced a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `/@lat,lon,zoom` viewport segment.
    At,
    /// `q=`, `query=`, `ll=` or `center=` parameter.
    Query,
    /// `!3dlat!4dlon` inside a `data=` segment.
    Bang,
    /// Bare `lat,lon` pair with no structural context.
    Loose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMatch {
    pub coordinate: Coordinate,
    pub marker: Marker,
    /// Byte offset of the match in the scanned text.
    pub offset: usize,
}

/// Feature id pair from a place data segment (`1s0x<feature>:0x<cid>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceId {
    pub feature: String,
    pub cid_hex: String,
}

impl PlaceId {
    /// The customer id in the decimal form `?cid=` expects.
    #[must_use]
    pub fn cid(&self) -> Option<u64> {
        u64::from_str_radix(self.cid_hex.trim_start_matches("0x"), 16).ok()
    }
}

/// All valid coordinate candidates in `text`, leftmost first.
///
/// Out-of-range pairs are discarded so a later valid match can still win.
#[must_use]
pub fn find_candidates(text: &str) -> Vec<CoordinateMatch> {
    let structural = structural_candidates(text);
    if structural.is_empty() {
        loose_candidates(text)
    } else {
        structural
    }
}

/// Bare `lat,lon` pairs (optionally `@`-prefixed) with at least three decimals
/// on each side, for rendered documents with no structural markers.
#[must_use]
pub fn loose_candidates(text: &str) -> Vec<CoordinateMatch> {
    collect(&LOOSE_PAIR, Marker::Loose, text)
}

/// Structural candidates only; never falls back to loose pairs.
#[must_use]
pub fn structural_candidates(text: &str) -> Vec<CoordinateMatch> {
    let mut found: Vec<CoordinateMatch> = [
        (&*AT_MARKER, Marker::At),
        (&*QUERY_MARKER, Marker::Query),
        (&*BANG_MARKER, Marker::Bang),
    ]
    .into_iter()
    .flat_map(|(re, marker)| collect(re, marker, text))
    .collect();
    found.sort_by_key(|m| m.offset);
    found
}

/// The coordinate the path-pattern strategy reports for `text`.
#[must_use]
pub fn first_coordinate(text: &str) -> Option<Coordinate> {
    find_candidates(text).first().map(|m| m.coordinate)
}

/// The first place id present in `text`, if any.
#[must_use]
pub fn place_id(text: &str) -> Option<PlaceId> {
    PLACE_ID.captures(text).map(|caps| PlaceId {
        feature: caps[1].to_owned(),
        cid_hex: caps[2].to_owned(),
    })
}

fn collect(re: &Regex, marker: Marker, text: &str) -> Vec<CoordinateMatch> {
    re.captures_iter(text)
        .filter_map(|caps| {
            let lat = caps.get(1)?;
            let lon = caps.get(2)?;
            let coordinate = Coordinate::parse_pair(lat.as_str(), lon.as_str())?;
            Some(CoordinateMatch {
                coordinate,
                marker,
                offset: lat.start(),
            })
        })
        .collect()
}
