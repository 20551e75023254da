//! The resolution pipeline: runs strategies in a fixed order under a
//! per-request time budget and returns the first success.

use std::sync::Arc;
use std::time::{Duration, Instant};

use maplink_core::{
    ResolutionError, ResolutionRequest, ResolutionResult, ResolverConfig, StrategyFailure,
    StrategyKind,
};

use crate::error::ResolverError;
use crate::geocode::GeocodingResolver;
use crate::redirect::RedirectResolver;
use crate::render::{BrowserResolver, RenderEngine};
use crate::strategy::{
    Attempt, DecodedParamsMatcher, PathPatternMatcher, ResolutionContext, Strategy,
};

/// Where a pipeline run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    /// Index into the strategy order.
    TryingStrategy(usize),
    Succeeded,
    AllExhausted,
}

/// Immutable, shareable list of strategies in run order.
#[derive(Clone)]
pub struct StrategyOrder(Arc<[Arc<dyn Strategy>]>);

impl StrategyOrder {
    #[must_use]
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self(strategies.into())
    }

    /// The standard order: path pattern, decoded params, redirect, browser,
    /// geocode. `render_ready` is the result of the engine's startup probe.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] if an HTTP client or the geocoder URL cannot
    /// be set up.
    pub fn standard(
        config: &ResolverConfig,
        engine: Arc<dyn RenderEngine>,
        render_ready: bool,
    ) -> Result<Self, ResolverError> {
        Ok(Self::new(vec![
            Arc::new(PathPatternMatcher),
            Arc::new(DecodedParamsMatcher),
            Arc::new(RedirectResolver::new(config)?),
            Arc::new(BrowserResolver::new(engine, config, render_ready)),
            Arc::new(GeocodingResolver::new(config)?),
        ]))
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.0.iter().map(|s| s.kind()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runs a [`StrategyOrder`] for one request at a time. Cheap to clone and
/// safe to use from many tasks at once.
#[derive(Clone)]
pub struct Pipeline {
    order: StrategyOrder,
    total_budget: Duration,
}

impl Pipeline {
    #[must_use]
    pub fn new(order: StrategyOrder, total_budget: Duration) -> Self {
        Self {
            order,
            total_budget,
        }
    }

    /// Standard pipeline for `config`.
    ///
    /// # Errors
    ///
    /// See [`StrategyOrder::standard`].
    pub fn from_config(
        config: &ResolverConfig,
        engine: Arc<dyn RenderEngine>,
        render_ready: bool,
    ) -> Result<Self, ResolverError> {
        Ok(Self::new(
            StrategyOrder::standard(config, engine, render_ready)?,
            config.total_budget,
        ))
    }

    #[must_use]
    pub fn order(&self) -> &StrategyOrder {
        &self.order
    }

    /// Resolves one request.
    ///
    /// Strategies run strictly in order; each is bounded by its own timeout
    /// clamped to what is left of the total budget.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::AllExhausted`] carrying the last strategy failure
    /// when every strategy failed or the budget ran out.
    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
    ) -> Result<ResolutionResult, ResolutionError> {
        let deadline = Instant::now() + self.total_budget;
        let mut ctx = ResolutionContext::new(request.clone());
        let mut state = PipelineState::NotStarted;
        let mut last: Option<StrategyFailure> = None;
        let mut budget_exceeded = false;

        for (index, strategy) in self.order.0.iter().enumerate() {
            let kind = strategy.kind();
            state = transition(state, PipelineState::TryingStrategy(index), request);

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                transition(state, PipelineState::AllExhausted, request);
                tracing::warn!(
                    url = %request.url(),
                    skipped_from = %kind,
                    "time budget exhausted, skipping remaining strategies"
                );
                return Err(ResolutionError::AllExhausted {
                    last: last.unwrap_or_else(|| {
                        StrategyFailure::new(
                            kind.timeout_failure(),
                            "time budget exhausted before any strategy completed",
                        )
                    }),
                    budget_exceeded: true,
                });
            }

            let limit = strategy.timeout().min(remaining);
            let started = Instant::now();
            let outcome = tokio::time::timeout(limit, strategy.attempt(&ctx)).await;
            let interim = ctx.take_progress();
            let attempt = match outcome {
                Ok(attempt) => attempt,
                Err(_) => {
                    budget_exceeded = limit == remaining;
                    Attempt::failure(timed_out(kind, limit, interim))
                }
            };
            let elapsed_ms = started.elapsed().as_millis();

            ctx.absorb(attempt.discovery);
            match attempt.outcome {
                Ok(resolved) => {
                    transition(state, PipelineState::Succeeded, request);
                    let place_label = ctx.place_label().or(resolved.place_label);
                    tracing::info!(
                        url = %request.url(),
                        strategy = %kind,
                        coordinate = %resolved.coordinate,
                        elapsed_ms,
                        "link resolved"
                    );
                    return Ok(ResolutionResult {
                        coordinate: resolved.coordinate,
                        place_label,
                        strategy: kind,
                    });
                }
                Err(failure) => {
                    log_failure(kind, &failure, elapsed_ms);
                    last = Some(failure);
                }
            }
        }

        transition(state, PipelineState::AllExhausted, request);
        let last = last.unwrap_or_else(|| StrategyFailure::no_match("no strategies configured"));
        tracing::warn!(url = %request.url(), last_failure = %last, "all strategies exhausted");
        Err(ResolutionError::AllExhausted {
            last,
            budget_exceeded,
        })
    }
}

/// Failure for an abandoned attempt: the last outcome it reported, else the
/// kind that fits the strategy.
fn timed_out(kind: StrategyKind, limit: Duration, interim: Option<StrategyFailure>) -> StrategyFailure {
    let detail = format!("{kind} timed out after {}ms", limit.as_millis());
    match interim {
        Some(last) => StrategyFailure::new(last.kind, format!("{detail}; last outcome: {}", last.detail)),
        None => StrategyFailure::new(kind.timeout_failure(), detail),
    }
}

fn transition(
    from: PipelineState,
    to: PipelineState,
    request: &ResolutionRequest,
) -> PipelineState {
    tracing::debug!(url = %request.url(), ?from, ?to, "pipeline transition");
    to
}

fn log_failure(kind: StrategyKind, failure: &StrategyFailure, elapsed_ms: u128) {
    use maplink_core::FailureKind;

    if failure.kind == FailureKind::NoMatch {
        tracing::debug!(strategy = %kind, elapsed_ms, failure = %failure, "strategy found nothing");
    } else {
        tracing::info!(strategy = %kind, elapsed_ms, failure = %failure, "strategy failed");
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
