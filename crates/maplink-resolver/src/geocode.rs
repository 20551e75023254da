//! Geocoding fallback: turns the place text of a link into coordinates via a
//! Nominatim-compatible `/search` endpoint.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use maplink_core::{
    Coordinate, FailureKind, PlaceLabel, ResolverConfig, Resolved, StrategyFailure, StrategyKind,
};
use regex::Regex;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::client::{build_client, read_body, MAX_BODY_BYTES};
use crate::error::ResolverError;
use crate::strategy::{Attempt, AttemptFuture, ResolutionContext, Strategy};

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{4}-\d{3}|\d{5})\b").expect("valid regex"));

const RESULT_LIMIT: &str = "3";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn as_text(&self) -> String {
        match self {
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s.clone(),
        }
    }
}

/// One element of a Nominatim `format=json` search response. `lat`/`lon`
/// are strings in Nominatim and numbers in some compatible services.
#[derive(Debug, Deserialize)]
struct SearchPlace {
    lat: NumberOrText,
    lon: NumberOrText,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
}

/// A geocoder hit with a valid coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    pub coordinate: Coordinate,
    pub label: Option<PlaceLabel>,
    /// Provider relevance score; missing scores count as zero.
    pub importance: f64,
}

pub struct GeocodingResolver {
    client: Client,
    search_url: Url,
    interval: Duration,
    region_hint: Option<String>,
    min_importance: Option<f64>,
    strategy_timeout: Duration,
}

impl GeocodingResolver {
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidUrl`] if `config.geocoder_url` is not
    /// an absolute URL, or [`ResolverError::Http`] if the client cannot be built.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let invalid = |reason: String| ResolverError::InvalidUrl {
            url: config.geocoder_url.clone(),
            reason,
        };
        let mut base = Url::parse(&config.geocoder_url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let search_url = base.join("search").map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            client: build_client(
                config.http_timeout,
                &config.geocoder_user_agent,
                Some(config.max_redirects),
            )?,
            search_url,
            interval: config.geocode_interval,
            region_hint: config.geocode_region_hint.clone(),
            min_importance: config.geocode_min_importance,
            strategy_timeout: config.geocode_timeout,
        })
    }

    /// Runs one search query and returns its candidates ranked by importance.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::UnexpectedStatus`]: non-2xx response.
    /// - [`ResolverError::Deserialize`]: body is not a JSON array of places.
    /// - [`ResolverError::Http`]: network or TLS failure.
    pub async fn search(&self, query: &str) -> Result<Vec<GeocodeCandidate>, ResolverError> {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("limit", RESULT_LIMIT);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = read_body(response, MAX_BODY_BYTES).await?;
        let places: Vec<SearchPlace> =
            serde_json::from_str(&body).map_err(|e| ResolverError::Deserialize {
                context: format!("geocoder search for \"{query}\""),
                source: e,
            })?;

        let candidates = places
            .into_iter()
            .filter_map(|place| {
                let coordinate =
                    Coordinate::parse_pair(&place.lat.as_text(), &place.lon.as_text())?;
                Some(GeocodeCandidate {
                    coordinate,
                    label: place.display_name.and_then(|n| PlaceLabel::new(n).ok()),
                    importance: place.importance.unwrap_or(0.0),
                })
            })
            .collect();
        Ok(rank_candidates(candidates))
    }

    fn accept(&self, candidates: Vec<GeocodeCandidate>) -> Option<GeocodeCandidate> {
        candidates
            .into_iter()
            .find(|c| self.min_importance.is_none_or(|min| c.importance >= min))
    }

    /// Geocodes `place_text`, trying each formulation until one yields an
    /// acceptable candidate.
    ///
    /// # Errors
    ///
    /// [`FailureKind::GeocodeEmpty`] when no formulation produced a candidate,
    /// or [`FailureKind::NetworkFailure`] when every request failed.
    pub async fn geocode(&self, place_text: &str) -> Result<Resolved, StrategyFailure> {
        self.run(place_text, None).await
    }

    /// [`Self::geocode`], reporting the outcome so far to `ctx` after every
    /// unsuccessful query.
    async fn run(
        &self,
        place_text: &str,
        ctx: Option<&ResolutionContext>,
    ) -> Result<Resolved, StrategyFailure> {
        let queries = query_formulations(place_text, self.region_hint.as_deref());
        let mut failed = 0usize;
        let mut last_error: Option<ResolverError> = None;

        for (index, query) in queries.iter().enumerate() {
            if index > 0 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            match self.search(query).await {
                Ok(candidates) => {
                    let found = candidates.len();
                    if let Some(best) = self.accept(candidates) {
                        tracing::info!(
                            query = %query,
                            coordinate = %best.coordinate,
                            importance = best.importance,
                            "geocoder match"
                        );
                        return Ok(Resolved::at(best.coordinate).with_label(best.label));
                    }
                    tracing::debug!(query = %query, found, "no acceptable geocoder candidate");
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "geocoder request failed");
                    failed += 1;
                    last_error = Some(e);
                }
            }
            if let Some(ctx) = ctx {
                ctx.record_failure(exhausted(index + 1, failed, last_error.as_ref()));
            }
        }

        Err(exhausted(queries.len(), failed, last_error.as_ref()))
    }
}

/// Failure after `tried` queries without a match: a network failure when every
/// one of them failed, otherwise an empty result.
fn exhausted(tried: usize, failed: usize, last_error: Option<&ResolverError>) -> StrategyFailure {
    match last_error {
        Some(e) if failed == tried => e.to_failure(),
        _ => StrategyFailure::new(
            FailureKind::GeocodeEmpty,
            format!("no candidates for {tried} queries"),
        ),
    }
}

/// Orders candidates by importance, highest first; ties keep provider order.
#[must_use]
pub fn rank_candidates(mut candidates: Vec<GeocodeCandidate>) -> Vec<GeocodeCandidate> {
    candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    candidates
}

/// Queries to try for `place_text`, most specific first, without duplicates.
///
/// The full text is sent as-is. Derived queries (postal-code parts, trailing
/// parts, individual parts, the business name) get `region_hint` appended.
#[must_use]
pub fn query_formulations(place_text: &str, region_hint: Option<&str>) -> Vec<String> {
    let full = place_text.trim();
    if full.is_empty() {
        return Vec::new();
    }
    let hinted = |query: String| match region_hint {
        Some(hint) => format!("{query}, {hint}"),
        None => query,
    };

    let mut queries = vec![full.to_owned()];
    let parts: Vec<&str> = full
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() >= 2 {
        for (i, part) in parts.iter().enumerate() {
            if POSTAL_CODE.is_match(part) {
                if i > 0 {
                    queries.push(hinted(parts[i - 1..=i].join(", ")));
                }
                queries.push(hinted((*part).to_owned()));
            }
        }

        let last = parts.len() - 1;
        queries.push(hinted(parts[last - 1..].join(", ")));
        queries.push(hinted(parts[last].to_owned()));

        queries.extend(
            parts[1..]
                .iter()
                .filter(|p| p.chars().count() > 3)
                .map(|p| hinted((*p).to_owned())),
        );
        queries.push(hinted(parts[0].to_owned()));
    }

    let mut seen = HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries
}

impl Strategy for GeocodingResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Geocode
    }

    fn timeout(&self) -> Duration {
        self.strategy_timeout
    }

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a> {
        Box::pin(async move {
            let Some(text) = ctx.place_text() else {
                return Attempt::failure(StrategyFailure::no_match("no place text to geocode"));
            };
            match self.run(&text, Some(ctx)).await {
                Ok(resolved) => Attempt::success(resolved),
                Err(failure) => Attempt::failure(failure),
            }
        })
    }
}
