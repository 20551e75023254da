//! Reply text for the messaging transport.

use crate::coordinate::Coordinate;
use crate::domains::DomainTable;
use crate::resolution::{ResolutionError, ResolutionResult};

const WAZE_BASE: &str = "https://ul.waze.com/ul";

/// Waze universal link for a coordinate: `https://ul.waze.com/ul?ll=<lat>,<lon>`.
#[must_use]
pub fn waze_link(coordinate: &Coordinate) -> String {
    format!("{WAZE_BASE}?ll={coordinate}")
}

/// Success reply: a label line (when a place label is known) and the link.
#[must_use]
pub fn format_reply(result: &ResolutionResult) -> String {
    let link = waze_link(&result.coordinate);
    match &result.place_label {
        Some(label) => format!("Here's your Waze link for {label}:\n{link}"),
        None => format!("Here's your Waze link:\n{link}"),
    }
}

/// The single user-visible failure message. The failure detail is logged,
/// never shown.
#[must_use]
pub fn format_failure(_error: &ResolutionError) -> String {
    "Couldn't find coordinates for that map link.\n\
     Make sure it points at a place or pinned location, or try sharing it again."
        .to_string()
}

/// Picks the first whitespace-separated token of `text` that is a link on one
/// of the table's share-link hosts. Messages without one are ignored.
#[must_use]
pub fn extract_share_link<'a>(text: &'a str, table: &DomainTable) -> Option<&'a str> {
    text.split_whitespace().find(|token| {
        let rest = token
            .strip_prefix("https://")
            .or_else(|| token.strip_prefix("http://"))
            .unwrap_or(token);
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        !host.is_empty() && rest.len() > host.len() && table.is_share_link_host(host)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::PlaceLabel;
    use crate::resolution::{FailureKind, StrategyFailure, StrategyKind};

    fn result(label: Option<&str>) -> ResolutionResult {
        ResolutionResult {
            coordinate: Coordinate::new(38.771_111_1, -9.0925).unwrap(),
            place_label: label.map(|l| PlaceLabel::new(l).unwrap()),
            strategy: StrategyKind::Redirect,
        }
    }

    #[test]
    fn waze_link_keeps_full_precision() {
        let c = Coordinate::new(38.771_111_1, -9.0925).unwrap();
        assert_eq!(waze_link(&c), "https://ul.waze.com/ul?ll=38.7711111,-9.0925");
    }

    #[test]
    fn reply_with_label_has_prefix_line() {
        assert_eq!(
            format_reply(&result(Some("Oceanario de Lisboa"))),
            "Here's your Waze link for Oceanario de Lisboa:\nhttps://ul.waze.com/ul?ll=38.7711111,-9.0925"
        );
    }

    #[test]
    fn reply_without_label() {
        assert_eq!(
            format_reply(&result(None)),
            "Here's your Waze link:\nhttps://ul.waze.com/ul?ll=38.7711111,-9.0925"
        );
    }

    #[test]
    fn failure_message_hides_detail() {
        let err = ResolutionError::AllExhausted {
            last: StrategyFailure::new(FailureKind::NetworkFailure, "secret internal detail"),
            budget_exceeded: false,
        };
        assert!(!format_failure(&err).contains("secret"));
    }

    #[test]
    fn extract_share_link_picks_first_short_link() {
        let table = DomainTable::default();
        let text = "look here https://maps.app.goo.gl/XodKRcb7kt53ne8d9 and https://maps.app.goo.gl/other";
        assert_eq!(
            extract_share_link(text, &table),
            Some("https://maps.app.goo.gl/XodKRcb7kt53ne8d9")
        );
    }

    #[test]
    fn extract_share_link_ignores_other_hosts_and_bare_hosts() {
        let table = DomainTable::default();
        assert_eq!(extract_share_link("https://example.com/x", &table), None);
        assert_eq!(extract_share_link("maps.app.goo.gl", &table), None);
        assert_eq!(
            extract_share_link("maps.app.goo.gl/abc", &table),
            Some("maps.app.goo.gl/abc")
        );
    }
}
