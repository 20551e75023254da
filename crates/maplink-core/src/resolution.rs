//! Request, outcome and failure types exchanged between the pipeline, its
//! strategies and the transport.

use serde::Serialize;
use thiserror::Error;

use crate::coordinate::{Coordinate, PlaceLabel};

/// One incoming link to resolve. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    url: String,
    locale: Option<String>,
}

impl ResolutionRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_owned(),
            locale: None,
        }
    }

    /// Attaches a locale hint (`"pt"`, `"en-GB"`); blank hints are ignored.
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        let trimmed = locale.trim();
        self.locale = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Primary language subtag of the locale hint, lowercased (`"en-GB"` → `"en"`).
    #[must_use]
    pub fn language(&self) -> Option<String> {
        self.locale
            .as_deref()
            .and_then(|l| l.split(['-', '_']).next())
            .map(str::to_ascii_lowercase)
    }
}

/// The resolution methods, in the order the standard pipeline runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PathPattern,
    DecodedParams,
    Redirect,
    Browser,
    Geocode,
}

impl StrategyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::PathPattern => "path_pattern",
            StrategyKind::DecodedParams => "decoded_params",
            StrategyKind::Redirect => "redirect",
            StrategyKind::Browser => "browser",
            StrategyKind::Geocode => "geocode",
        }
    }

    /// Failure kind reported when this strategy runs out of time.
    #[must_use]
    pub fn timeout_failure(self) -> FailureKind {
        match self {
            StrategyKind::PathPattern | StrategyKind::DecodedParams => FailureKind::NoMatch,
            StrategyKind::Redirect | StrategyKind::Geocode => FailureKind::NetworkFailure,
            StrategyKind::Browser => FailureKind::RenderFailure,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable failure categories. None of them is fatal to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No coordinate-bearing pattern present. Expected and common.
    NoMatch,
    /// Timeout, refused connection, non-2xx status or redirect loop.
    NetworkFailure,
    /// Render engine missing, render timeout, or consent control not found.
    RenderFailure,
    /// The geocoder returned no acceptable candidate for any query.
    GeocodeEmpty,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::NoMatch => "no_match",
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::RenderFailure => "render_failure",
            FailureKind::GeocodeEmpty => "geocode_empty",
        };
        f.write_str(s)
    }
}

/// A strategy's typed failure with a human-readable detail for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct StrategyFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl StrategyFailure {
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn no_match(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::NoMatch, detail)
    }
}

/// A single strategy's successful answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub coordinate: Coordinate,
    pub place_label: Option<PlaceLabel>,
}

impl Resolved {
    #[must_use]
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            place_label: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: Option<PlaceLabel>) -> Self {
        self.place_label = label;
        self
    }
}

/// The pipeline's answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub coordinate: Coordinate,
    pub place_label: Option<PlaceLabel>,
    /// Which strategy produced the coordinate.
    pub strategy: StrategyKind,
}

/// Overall failure: every strategy failed or the time budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("all strategies exhausted (last failure: {last}{})", budget_suffix(.budget_exceeded))]
    AllExhausted {
        last: StrategyFailure,
        budget_exceeded: bool,
    },
}

fn budget_suffix(budget_exceeded: &bool) -> &'static str {
    if *budget_exceeded {
        ", time budget exceeded"
    } else {
        ""
    }
}

impl ResolutionError {
    #[must_use]
    pub fn last_failure(&self) -> &StrategyFailure {
        match self {
            ResolutionError::AllExhausted { last, .. } => last,
        }
    }
}
