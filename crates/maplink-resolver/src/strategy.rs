//! The strategy seam: one trait every resolution method implements, plus the
//! two offline matchers that run first.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use maplink_core::{
    PlaceLabel, ResolutionRequest, Resolved, StrategyFailure, StrategyKind,
};

use crate::{decode, pattern};

/// Boxed future returned by [`Strategy::attempt`].
pub type AttemptFuture<'a> = Pin<Box<dyn Future<Output = Attempt> + Send + 'a>>;

/// One way of turning a link into a coordinate.
///
/// Implementations are stateless with respect to a request: everything learned
/// during an attempt goes back to the pipeline through [`Attempt::discovery`],
/// or through [`ResolutionContext::record`] when it must survive a timeout.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Upper bound on a single attempt. The pipeline clamps it to the
    /// remaining request budget.
    fn timeout(&self) -> Duration;

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a>;
}

/// Facts learned while attempting, kept even when the attempt fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Long form of a short link, with any consent wrapper removed.
    pub expanded_url: Option<String>,
    pub place_label: Option<PlaceLabel>,
}

impl Discovery {
    #[must_use]
    pub fn expanded(url: impl Into<String>) -> Self {
        Self {
            expanded_url: Some(url.into()),
            place_label: None,
        }
    }
}

/// Result of one strategy attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub outcome: Result<Resolved, StrategyFailure>,
    pub discovery: Discovery,
}

impl Attempt {
    #[must_use]
    pub fn success(resolved: Resolved) -> Self {
        Self {
            outcome: Ok(resolved),
            discovery: Discovery::default(),
        }
    }

    #[must_use]
    pub fn failure(failure: StrategyFailure) -> Self {
        Self {
            outcome: Err(failure),
            discovery: Discovery::default(),
        }
    }

    #[must_use]
    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }
}

/// What the running attempt has reported so far.
#[derive(Debug, Default)]
struct Progress {
    discovery: Discovery,
    failure: Option<StrategyFailure>,
}

/// Per-request working state shared with each strategy in turn.
#[derive(Debug)]
pub struct ResolutionContext {
    request: ResolutionRequest,
    discovery: Discovery,
    progress: Mutex<Progress>,
}

impl ResolutionContext {
    #[must_use]
    pub fn new(request: ResolutionRequest) -> Self {
        Self {
            request,
            discovery: Discovery::default(),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Reports a discovery while the attempt is still running, so it is kept
    /// even if the pipeline abandons the attempt.
    pub fn record(&self, discovery: Discovery) {
        let mut progress = self.progress();
        if discovery.expanded_url.is_some() {
            progress.discovery.expanded_url = discovery.expanded_url;
        }
        if discovery.place_label.is_some() {
            progress.discovery.place_label = discovery.place_label;
        }
    }

    /// Reports the outcome the attempt would give if it stopped now. Used in
    /// place of the generic timeout failure when the attempt is abandoned.
    pub fn record_failure(&self, failure: StrategyFailure) {
        self.progress().failure = Some(failure);
    }

    /// Absorbs what the last attempt recorded and returns its interim
    /// failure, leaving the record empty for the next attempt.
    pub fn take_progress(&mut self) -> Option<StrategyFailure> {
        let progress = std::mem::take(
            self.progress
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.absorb(progress.discovery);
        progress.failure
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn request(&self) -> &ResolutionRequest {
        &self.request
    }

    /// The best URL known so far: the expanded form if one was discovered.
    #[must_use]
    pub fn url(&self) -> &str {
        self.discovery
            .expanded_url
            .as_deref()
            .unwrap_or_else(|| self.request.url())
    }

    #[must_use]
    pub fn expanded_url(&self) -> Option<&str> {
        self.discovery.expanded_url.as_deref()
    }

    /// Free-text place description for geocoding.
    #[must_use]
    pub fn place_text(&self) -> Option<String> {
        decode::place_segment(self.url()).or_else(|| decode::place_segment(self.request.url()))
    }

    /// URL-derived label: an explicitly discovered one, else the working URL's.
    #[must_use]
    pub fn place_label(&self) -> Option<PlaceLabel> {
        self.discovery
            .place_label
            .clone()
            .or_else(|| decode::place_label(self.url()))
    }

    /// Merges what an attempt learned. Later discoveries replace earlier ones.
    pub fn absorb(&mut self, discovery: Discovery) {
        if discovery.expanded_url.is_some() {
            self.discovery.expanded_url = discovery.expanded_url;
        }
        if discovery.place_label.is_some() {
            self.discovery.place_label = discovery.place_label;
        }
    }
}

/// Structural markers in the raw request URL. No I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPatternMatcher;

impl Strategy for PathPatternMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PathPattern
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a> {
        Box::pin(async move {
            match pattern::first_coordinate(ctx.request().url()) {
                Some(coordinate) => Attempt::success(Resolved::at(coordinate)),
                None => Attempt::failure(StrategyFailure::no_match(
                    "no coordinate marker in URL",
                )),
            }
        })
    }
}

/// Markers hidden behind percent-encoding, nested URLs and data segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodedParamsMatcher;

impl Strategy for DecodedParamsMatcher {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DecodedParams
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a> {
        Box::pin(async move {
            match decode::find_in_decoded(ctx.request().url()) {
                Some(coordinate) => Attempt::success(Resolved::at(coordinate)),
                None => Attempt::failure(StrategyFailure::no_match(
                    "no coordinate in decoded URL parts",
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use maplink_core::FailureKind;

    use super::*;

    fn ctx(url: &str) -> ResolutionContext {
        ResolutionContext::new(ResolutionRequest::new(url))
    }

    #[tokio::test]
    async fn path_pattern_matches_viewport_segment() {
        let c = ctx("https://www.google.com/maps/place/Cafe/@38.7223,-9.1393,17z");
        let attempt = PathPatternMatcher.attempt(&c).await;
        assert_eq!(
            attempt.outcome.unwrap().coordinate.to_string(),
            "38.7223,-9.1393"
        );
    }

    #[tokio::test]
    async fn path_pattern_fails_with_no_match_on_short_link() {
        let c = ctx("https://maps.app.goo.gl/XodKRcb7kt53ne8d9");
        let failure = PathPatternMatcher.attempt(&c).await.outcome.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NoMatch);
    }

    #[tokio::test]
    async fn decoded_params_finds_encoded_pair() {
        let c = ctx("https://www.google.com/maps/search/?api=1&query=%4038.7223%2C%20-9.1393");
        let attempt = DecodedParamsMatcher.attempt(&c).await;
        assert_eq!(
            attempt.outcome.unwrap().coordinate.to_string(),
            "38.7223,-9.1393"
        );
    }

    #[test]
    fn context_prefers_expanded_url_and_keeps_earlier_discovery() {
        let mut c = ctx("https://maps.app.goo.gl/abc");
        assert_eq!(c.url(), "https://maps.app.goo.gl/abc");
        assert_eq!(c.place_label(), None);

        c.absorb(Discovery::expanded(
            "https://www.google.com/maps/place/Cafe+Luso,+Lisboa/",
        ));
        assert_eq!(c.url(), "https://www.google.com/maps/place/Cafe+Luso,+Lisboa/");
        assert_eq!(c.place_label().unwrap().as_str(), "Cafe Luso");
        assert_eq!(c.place_text().as_deref(), Some("Cafe Luso, Lisboa"));

        c.absorb(Discovery::default());
        assert!(c.expanded_url().is_some());
    }

    #[test]
    fn recorded_progress_is_absorbed_once() {
        let mut c = ctx("https://maps.app.goo.gl/abc");
        c.record(Discovery::expanded("https://www.google.com/maps/place/Cafe+Luso/"));
        c.record_failure(StrategyFailure::new(FailureKind::GeocodeEmpty, "2 queries empty"));
        assert_eq!(c.url(), "https://maps.app.goo.gl/abc");

        let interim = c.take_progress().unwrap();
        assert_eq!(interim.kind, FailureKind::GeocodeEmpty);
        assert_eq!(c.url(), "https://www.google.com/maps/place/Cafe+Luso/");

        assert!(c.take_progress().is_none());
        assert_eq!(c.url(), "https://www.google.com/maps/place/Cafe+Luso/");
    }
}
