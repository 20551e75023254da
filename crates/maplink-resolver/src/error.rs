use std::time::Duration;

use maplink_core::{FailureKind, StrategyFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("redirect loop: {url} visited twice after {hops} hops")]
    RedirectLoop { url: String, hops: usize },

    #[error("too many redirects starting at {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    #[error("consent wall at {url}")]
    ConsentWall { url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ResolverError {
    /// Every HTTP-level fault is a recoverable network failure for the pipeline.
    #[must_use]
    pub fn to_failure(&self) -> StrategyFailure {
        StrategyFailure::new(FailureKind::NetworkFailure, self.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render engine unavailable: {0}")]
    Unavailable(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("render timed out after {0:?}")]
    Timeout(Duration),

    #[error("consent control not found (tried labels {labels:?})")]
    ConsentControlNotFound { labels: Vec<String> },

    #[error("no coordinates in rendered document at {url}")]
    NoCoordinates { url: String },

    #[error("render engine error: {0}")]
    Engine(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("render task failed: {0}")]
    Task(String),
}

impl RenderError {
    #[must_use]
    pub fn to_failure(&self) -> StrategyFailure {
        StrategyFailure::new(FailureKind::RenderFailure, self.to_string())
    }
}
