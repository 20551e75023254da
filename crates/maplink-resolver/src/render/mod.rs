//! Headless-render resolution for pages that only reveal coordinates after
//! client-side scripts run.
//!
//! Rendering is blocking and runs on tokio's blocking pool. The engine
//! resource is held by a [`RenderLease`] so it is released on every path out
//! of an attempt. When the pipeline drops an attempt on timeout, the session
//! is closed before the drop returns, even if an engine call is in flight.

pub mod chrome;

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use maplink_core::{Coordinate, DomainTable, ResolverConfig, Resolved, StrategyKind};

use crate::decode;
use crate::error::RenderError;
use crate::pattern;
use crate::strategy::{Attempt, AttemptFuture, ResolutionContext, Strategy};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Settings for opening a render session.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub user_agent: String,
    /// `Accept-Language` for the session, when the request has a locale.
    pub accept_language: Option<String>,
    /// Per-operation timeout inside the engine (navigation, evaluation).
    pub step_timeout: Duration,
    pub window: (u32, u32),
}

impl RenderOptions {
    #[must_use]
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            accept_language: None,
            step_timeout: config.render_timeout,
            window: (1280, 900),
        }
    }
}

/// A browser-like engine able to open isolated sessions.
pub trait RenderEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens a fresh session. Dropping the session releases its resources.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Unavailable`] if the engine cannot start.
    fn open(&self, options: &RenderOptions) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One open page. Shared between the thread driving it and the attempt that
/// may close it, so every operation takes `&self`.
pub trait RenderSession: Send + Sync {
    /// Navigates and waits for the initial load.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Navigation`] if the page does not load.
    fn navigate(&self, url: &str) -> Result<(), RenderError>;

    /// The page's current URL, which scripts may rewrite after load.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Engine`] if the engine stops responding.
    fn current_url(&self) -> Result<String, RenderError>;

    /// The serialized document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Engine`] if the engine stops responding.
    fn content(&self) -> Result<String, RenderError>;

    /// Clicks the first button or link whose visible text matches one of
    /// `labels`, trying labels in order. Returns the label clicked.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Engine`] if the engine stops responding.
    fn click_labelled(&self, labels: &[String]) -> Result<Option<String>, RenderError>;

    /// Tears the session down and frees the engine resources behind it. May
    /// run on another thread while an operation is in flight; that operation
    /// then fails or returns early.
    fn close(&self);
}

/// Releases a session exactly once, from whichever side gets there first.
#[derive(Clone)]
pub struct ReleaseHandle {
    session: Arc<dyn RenderSession>,
    released: Arc<AtomicBool>,
    engine: &'static str,
}

impl ReleaseHandle {
    /// Closes the session. Later calls are no-ops.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.session.close();
            tracing::debug!(engine = self.engine, "render session released");
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Scoped ownership of one render session.
pub struct RenderLease {
    handle: ReleaseHandle,
}

impl RenderLease {
    /// # Errors
    ///
    /// Propagates the engine's [`RenderEngine::open`] error.
    pub fn acquire(engine: &dyn RenderEngine, options: &RenderOptions) -> Result<Self, RenderError> {
        let session: Arc<dyn RenderSession> = Arc::from(engine.open(options)?);
        tracing::debug!(engine = engine.name(), "render session acquired");
        Ok(Self {
            handle: ReleaseHandle {
                session,
                released: Arc::new(AtomicBool::new(false)),
                engine: engine.name(),
            },
        })
    }

    /// A handle that can release this session from another thread.
    #[must_use]
    pub fn release_handle(&self) -> ReleaseHandle {
        self.handle.clone()
    }
}

impl Deref for RenderLease {
    type Target = dyn RenderSession;

    fn deref(&self) -> &Self::Target {
        self.handle.session.as_ref()
    }
}

impl Drop for RenderLease {
    fn drop(&mut self) {
        self.handle.release();
    }
}

/// Cancellation state shared by an attempt's future and its blocking render.
#[derive(Default)]
struct RenderSlot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    cancelled: bool,
    session: Option<ReleaseHandle>,
}

impl RenderSlot {
    fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Registers a freshly opened session. Fails if the attempt was already
    /// dropped, in which case the caller's lease closes the session.
    fn install(&self, lease: &RenderLease) -> Result<(), RenderError> {
        let mut state = self.lock();
        if state.cancelled {
            return Err(RenderError::Cancelled);
        }
        state.session = Some(lease.release_handle());
        Ok(())
    }

    fn cancel(&self) {
        let session = {
            let mut state = self.lock();
            state.cancelled = true;
            state.session.take()
        };
        if let Some(handle) = session {
            handle.release();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancels the render and closes its session when the owning future is
/// dropped.
struct CancelOnDrop(Arc<RenderSlot>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Checks that a render engine can open a session and load a page.
///
/// # Errors
///
/// Returns the first [`RenderError`] hit while opening or navigating.
pub fn probe(engine: &dyn RenderEngine, options: &RenderOptions) -> Result<(), RenderError> {
    let lease = RenderLease::acquire(engine, options)?;
    lease.navigate("about:blank")?;
    lease.current_url()?;
    Ok(())
}

struct RenderJob {
    url: String,
    labels: Vec<String>,
    options: RenderOptions,
    settle: Duration,
    domains: DomainTable,
}

/// Renders a link in a headless engine and reads coordinates from the
/// settled URL or document.
pub struct BrowserResolver {
    engine: Arc<dyn RenderEngine>,
    available: bool,
    domains: DomainTable,
    options: RenderOptions,
    settle: Duration,
    strategy_timeout: Duration,
}

impl BrowserResolver {
    /// `available` is the outcome of the startup probe; when false every
    /// attempt fails fast with [`RenderError::Unavailable`].
    #[must_use]
    pub fn new(engine: Arc<dyn RenderEngine>, config: &ResolverConfig, available: bool) -> Self {
        Self {
            engine,
            available: available && config.render_enabled,
            domains: config.domains.clone(),
            options: RenderOptions::from_config(config),
            settle: config.render_settle,
            strategy_timeout: config.render_timeout,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Renders `url` and returns the first coordinate it reveals.
    ///
    /// # Errors
    ///
    /// Any [`RenderError`]; the pipeline maps them all to a render failure.
    pub async fn resolve(&self, url: &str, language: Option<&str>) -> Result<Resolved, RenderError> {
        if !self.available {
            return Err(RenderError::Unavailable(format!(
                "{} engine disabled",
                self.engine.name()
            )));
        }

        let mut options = self.options.clone();
        options.accept_language = language.map(str::to_owned);
        let job = RenderJob {
            url: url.to_owned(),
            labels: self.domains.consent_labels_for(language),
            options,
            settle: self.settle,
            domains: self.domains.clone(),
        };

        let slot = Arc::new(RenderSlot::default());
        let _guard = CancelOnDrop(Arc::clone(&slot));
        let engine = Arc::clone(&self.engine);

        tokio::task::spawn_blocking(move || render_blocking(engine.as_ref(), &job, &slot))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

fn render_blocking(
    engine: &dyn RenderEngine,
    job: &RenderJob,
    slot: &RenderSlot,
) -> Result<Resolved, RenderError> {
    let check = || {
        if slot.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    };

    check()?;
    let lease = RenderLease::acquire(engine, &job.options)?;
    slot.install(&lease)?;
    lease.navigate(&job.url)?;
    check()?;

    if let Some(coordinate) = settle(&lease, job, slot)? {
        return Ok(Resolved::at(coordinate));
    }

    let current = lease.current_url()?;
    let on_consent = decode::host_of(&current).is_some_and(|h| job.domains.is_consent_host(h))
        || job.domains.has_consent_marker(&lease.content()?);
    if on_consent {
        check()?;
        match lease.click_labelled(&job.labels)? {
            Some(label) => tracing::debug!(%label, "accepted consent in render"),
            None => {
                return Err(RenderError::ConsentControlNotFound {
                    labels: job.labels.clone(),
                })
            }
        }
        if let Some(coordinate) = settle(&lease, job, slot)? {
            return Ok(Resolved::at(coordinate));
        }
    }

    check()?;
    let content = lease.content()?;
    if let Some(coordinate) = pattern::first_coordinate(&content) {
        return Ok(Resolved::at(coordinate));
    }
    Err(RenderError::NoCoordinates {
        url: lease.current_url()?,
    })
}

/// Polls the current URL until it carries a coordinate or the settle time
/// runs out.
fn settle(
    lease: &RenderLease,
    job: &RenderJob,
    slot: &RenderSlot,
) -> Result<Option<Coordinate>, RenderError> {
    let deadline = Instant::now() + job.settle;
    loop {
        if slot.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let url = lease.current_url()?;
        if let Some(coordinate) = decode::coordinate_in_url(&url, &job.domains) {
            tracing::debug!(%url, "coordinate in rendered URL");
            return Ok(Some(coordinate));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

impl Strategy for BrowserResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    fn timeout(&self) -> Duration {
        self.strategy_timeout
    }

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a> {
        Box::pin(async move {
            let url = ctx.url().to_owned();
            let language = ctx.request().language();
            match self.resolve(&url, language.as_deref()).await {
                Ok(resolved) => Attempt::success(resolved),
                Err(e) => {
                    tracing::debug!(%url, error = %e, "render attempt failed");
                    Attempt::failure(e.to_failure())
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
