use maplink_core::DomainTable;
use reqwest::Url;

use crate::pattern;

/// Path and query to request on each origin during domain fallback.
///
/// A place id in the URL becomes a `cid` lookup, which every regional origin
/// answers. Otherwise the URL's own path and query are reused. Short-link and
/// consent hosts have no reusable path.
#[must_use]
pub fn probe_path(url: &str, domains: &DomainTable) -> Option<String> {
    if let Some(cid) = pattern::place_id(url).and_then(|id| id.cid()) {
        return Some(format!("/maps?cid={cid}"));
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if domains.is_share_link_host(host) || domains.is_consent_host(host) {
        return None;
    }

    let path = parsed.path();
    if path.is_empty() || path == "/" {
        return None;
    }
    Some(match parsed.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_id_becomes_cid_lookup() {
        let url = "https://www.google.com/maps/place/X/data=!4m2!3m1!1s0x0:0x10";
        assert_eq!(
            probe_path(url, &DomainTable::default()).as_deref(),
            Some("/maps?cid=16")
        );
    }

    #[test]
    fn plain_place_url_reuses_path_and_query() {
        let url = "https://www.google.com/maps/place/Cafe+Luso/?hl=pt";
        assert_eq!(
            probe_path(url, &DomainTable::default()).as_deref(),
            Some("/maps/place/Cafe+Luso/?hl=pt")
        );
    }

    #[test]
    fn short_link_and_root_have_no_probe() {
        let table = DomainTable::default();
        assert_eq!(probe_path("https://maps.app.goo.gl/XodKRcb7kt53ne8d9", &table), None);
        assert_eq!(probe_path("https://www.google.com/", &table), None);
        assert_eq!(probe_path("not a url", &table), None);
    }
}
