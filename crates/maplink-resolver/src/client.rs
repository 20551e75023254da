//! Shared `reqwest` client construction.

use std::time::Duration;

use reqwest::{redirect, Client, Response};

use crate::error::ResolverError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on how much of a response body is read.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds a client with the given per-request timeout and `User-Agent`.
///
/// `follow_redirects` is the hop limit reqwest may follow on its own; `None`
/// turns following off so callers can inspect every `Location` hop themselves.
///
/// # Errors
///
/// Returns [`ResolverError::Http`] if the underlying `reqwest::Client`
/// cannot be constructed (e.g., invalid TLS config).
pub(crate) fn build_client(
    timeout: Duration,
    user_agent: &str,
    follow_redirects: Option<usize>,
) -> Result<Client, ResolverError> {
    let policy = match follow_redirects {
        Some(limit) => redirect::Policy::limited(limit),
        None => redirect::Policy::none(),
    };
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(user_agent)
        .redirect(policy)
        .build()?;
    Ok(client)
}

/// Reads at most `limit` bytes of the body, decoding lossily. The rest of an
/// oversized body is left unread.
///
/// # Errors
///
/// Returns [`ResolverError::Http`] if the connection fails mid-body.
pub(crate) async fn read_body(mut response: Response, limit: usize) -> Result<String, ResolverError> {
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            tracing::debug!(url = %response.url(), limit, "response body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
