//! `resolve` and `reply` command handlers.
//!
//! Links are resolved concurrently through one shared pipeline. A link that
//! fails to resolve is reported and counted, never aborting the others.

use futures::stream::{self, StreamExt};
use maplink_core::{
    extract_share_link, format_failure, format_reply, waze_link, ResolutionError,
    ResolutionRequest, ResolutionResult, ResolverConfig,
};
use maplink_resolver::Pipeline;

use crate::browser;

async fn build_pipeline(config: &ResolverConfig) -> anyhow::Result<Pipeline> {
    let engine = browser::engine(config);
    let render_ready = browser::startup_probe(config, std::sync::Arc::clone(&engine)).await;
    Ok(Pipeline::from_config(config, engine, render_ready)?)
}

/// Adds an `https://` scheme to links pasted without one.
pub(crate) fn normalize_link(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

fn request_for(link: &str, locale: Option<&str>) -> ResolutionRequest {
    let request = ResolutionRequest::new(normalize_link(link));
    match locale {
        Some(locale) => request.with_locale(locale),
        None => request,
    }
}

fn json_line(url: &str, outcome: &Result<ResolutionResult, ResolutionError>) -> String {
    let value = match outcome {
        Ok(result) => serde_json::json!({
            "url": url,
            "result": result,
            "waze_link": waze_link(&result.coordinate),
        }),
        Err(err) => serde_json::json!({
            "url": url,
            "error": err.to_string(),
            "failure_kind": err.last_failure().kind,
        }),
    };
    value.to_string()
}

/// `resolve`: prints a reply (or JSON object) per link.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built or if any link failed to
/// resolve (after printing every result).
pub(crate) async fn run_resolve(
    config: &ResolverConfig,
    urls: &[String],
    concurrency: usize,
    locale: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config).await?;

    let outcomes: Vec<(String, Result<ResolutionResult, ResolutionError>)> =
        stream::iter(urls.iter().cloned())
            .map(|url| {
                let pipeline = pipeline.clone();
                let request = request_for(&url, locale);
                async move {
                    let outcome = pipeline.resolve(&request).await;
                    (url, outcome)
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut failed = 0usize;
    for (url, outcome) in &outcomes {
        if json {
            println!("{}", json_line(url, outcome));
        } else {
            match outcome {
                Ok(result) => println!("{url}\n{}\n", format_reply(result)),
                Err(err) => println!("{url}\n{}\n", format_failure(err)),
            }
        }
        if outcome.is_err() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} links could not be resolved", outcomes.len());
    }
    Ok(())
}

/// `reply`: behaves like the chat transport. Text without a share link is
/// ignored silently.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built.
pub(crate) async fn run_reply(
    config: &ResolverConfig,
    text: &str,
    locale: Option<&str>,
) -> anyhow::Result<()> {
    let Some(link) = extract_share_link(text, &config.domains) else {
        tracing::info!("message has no share link, ignoring");
        return Ok(());
    };

    let pipeline = build_pipeline(config).await?;
    let request = request_for(link, locale);
    match pipeline.resolve(&request).await {
        Ok(result) => println!("{}", format_reply(&result)),
        Err(err) => {
            tracing::warn!(url = %request.url(), error = %err, "could not resolve link");
            println!("{}", format_failure(&err));
        }
    }
    Ok(())
}
