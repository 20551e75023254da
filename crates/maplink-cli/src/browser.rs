//! Render engine setup and the startup health probe.

use std::sync::Arc;
use std::time::Duration;

use maplink_core::ResolverConfig;
use maplink_resolver::{probe, ChromeEngine, RenderEngine, RenderOptions};

/// Headless Chrome engine for `config`. Idle browsers are torn down after a
/// few render timeouts.
pub(crate) fn engine(config: &ResolverConfig) -> Arc<ChromeEngine> {
    Arc::new(ChromeEngine::new(
        config.render_timeout.saturating_mul(3).max(Duration::from_secs(10)),
    ))
}

/// Runs the engine health probe off the async runtime.
async fn probe_engine(
    engine: Arc<ChromeEngine>,
    options: RenderOptions,
) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || probe(engine.as_ref(), &options)).await??;
    Ok(())
}

/// Whether the browser strategy should run. A failed probe disables it for
/// the life of the process; the rest of the pipeline is unaffected.
pub(crate) async fn startup_probe(config: &ResolverConfig, engine: Arc<ChromeEngine>) -> bool {
    if !config.render_enabled {
        tracing::info!("headless rendering disabled by configuration");
        return false;
    }
    let name = engine.name();
    match probe_engine(engine, RenderOptions::from_config(config)).await {
        Ok(()) => {
            tracing::info!(engine = name, "render engine ready");
            true
        }
        Err(e) => {
            tracing::warn!(engine = name, error = %e, "render engine unavailable, browser strategy disabled");
            false
        }
    }
}

/// `check-browser`: probe once and report.
///
/// # Errors
///
/// Returns an error if the engine cannot be launched or cannot load a page.
pub(crate) async fn run_check(config: &ResolverConfig) -> anyhow::Result<()> {
    let chrome = engine(config);
    let name = chrome.name();
    probe_engine(chrome, RenderOptions::from_config(config)).await?;
    println!("render engine '{name}' is working");
    Ok(())
}
