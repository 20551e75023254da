//! [`RenderEngine`] backed by a headless Chrome/Chromium via `headless_chrome`.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};

use super::{RenderEngine, RenderOptions, RenderSession};
use crate::error::RenderError;

const CHROME_ARGS: [&str; 4] = [
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--disable-blink-features=AutomationControlled",
];

/// Clicks the first visible control whose text equals one of the labels.
const CLICK_LABELLED_JS: &str = r#"
(() => {
    const labels = __LABELS__;
    const nodes = Array.from(document.querySelectorAll(
        'button, [role="button"], input[type="submit"], a'
    ));
    for (const label of labels) {
        const wanted = label.trim().toLowerCase();
        const hit = nodes.find((n) =>
            (n.innerText || n.value || '').trim().toLowerCase() === wanted
        );
        if (hit) {
            hit.click();
            return label;
        }
    }
    return null;
})()
"#;

/// Launches one browser process per session.
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    idle_timeout: Duration,
}

impl ChromeEngine {
    /// `idle_timeout` bounds how long a launched browser may sit without
    /// activity before `headless_chrome` tears it down.
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }
}

impl Default for ChromeEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn engine_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Engine(e.to_string())
}

impl RenderEngine for ChromeEngine {
    fn name(&self) -> &'static str {
        "chrome"
    }

    fn open(&self, options: &RenderOptions) -> Result<Box<dyn RenderSession>, RenderError> {
        let browser = Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            window_size: Some(options.window),
            idle_browser_timeout: self.idle_timeout,
            args: CHROME_ARGS.iter().map(OsStr::new).collect(),
            ..Default::default()
        })
        .map_err(|e| RenderError::Unavailable(e.to_string()))?;

        let tab = browser.new_tab().map_err(engine_error)?;
        tab.set_default_timeout(options.step_timeout);
        tab.set_user_agent(
            &options.user_agent,
            options.accept_language.as_deref(),
            None,
        )
        .map_err(engine_error)?;

        Ok(Box::new(ChromeSession {
            tab,
            browser: Mutex::new(Some(browser)),
        }))
    }
}

/// Holds the only handle to its browser; dropping that handle kills the
/// process, which also aborts any call still waiting on the tab.
struct ChromeSession {
    tab: Arc<Tab>,
    browser: Mutex<Option<Browser>>,
}

impl RenderSession for ChromeSession {
    fn navigate(&self, url: &str) -> Result<(), RenderError> {
        let navigation = |reason: String| RenderError::Navigation {
            url: url.to_owned(),
            reason,
        };
        self.tab
            .navigate_to(url)
            .map_err(|e| navigation(e.to_string()))?
            .wait_until_navigated()
            .map_err(|e| navigation(e.to_string()))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, RenderError> {
        Ok(self.tab.get_url())
    }

    fn content(&self) -> Result<String, RenderError> {
        self.tab.get_content().map_err(engine_error)
    }

    fn click_labelled(&self, labels: &[String]) -> Result<Option<String>, RenderError> {
        let encoded = serde_json::to_string(labels).map_err(engine_error)?;
        let script = CLICK_LABELLED_JS.replace("__LABELS__", &encoded);
        let result = self.tab.evaluate(&script, false).map_err(engine_error)?;
        let clicked = match result.value {
            Some(serde_json::Value::String(label)) => Some(label),
            _ => None,
        };
        if clicked.is_some() {
            // A consent click usually triggers navigation; a page that stays put is fine.
            let _ = self.tab.wait_until_navigated();
        }
        Ok(clicked)
    }

    fn close(&self) {
        let browser = self
            .browser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(browser) = browser {
            tracing::debug!(pid = ?browser.get_process_id(), "closing chrome");
            drop(browser);
        }
    }
}
