//! HTTP redirect resolution: expands short links hop by hop, inspects every
//! hop for coordinates, handles consent interstitials and falls back across
//! regional origins.

mod probe;

use std::collections::HashSet;
use std::time::Duration;

use maplink_core::{
    Coordinate, DomainTable, ResolverConfig, Resolved, StrategyFailure, StrategyKind,
};
use reqwest::header::{HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, LOCATION};
use reqwest::{Client, Url};

use crate::client::{build_client, read_body, MAX_BODY_BYTES};
use crate::decode;
use crate::error::ResolverError;
use crate::pattern;
use crate::strategy::{Attempt, AttemptFuture, Discovery, ResolutionContext, Strategy};

pub use probe::probe_path;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Where a chain of redirects ended.
#[derive(Debug, Clone)]
pub struct Landing {
    /// Every URL requested, starting with the input.
    pub chain: Vec<String>,
    pub final_url: String,
    pub body: String,
    /// The landing page is a consent interstitial.
    pub consent: bool,
}

/// Follows redirects manually so each `Location` can be inspected.
pub struct RedirectResolver {
    client: Client,
    max_redirects: usize,
    domains: DomainTable,
    strategy_timeout: Duration,
    body_limit: usize,
}

impl RedirectResolver {
    /// Creates a resolver from the HTTP settings and domain table in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let client = build_client(config.http_timeout, &config.user_agent, None)?;
        Ok(Self {
            client,
            max_redirects: config.max_redirects,
            domains: config.domains.clone(),
            strategy_timeout: config.redirect_strategy_timeout,
            body_limit: MAX_BODY_BYTES,
        })
    }

    /// Caps how many bytes of a landing page are read and inspected.
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    #[must_use]
    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    /// Requests `url` and follows redirects until a non-redirect response or
    /// a hop whose URL already carries a coordinate.
    ///
    /// `cookie` is sent on every hop when given; `language` becomes the
    /// `Accept-Language` preference.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidUrl`]: `url` or a `Location` is not a valid URL.
    /// - [`ResolverError::RedirectLoop`]: a URL repeats within the chain.
    /// - [`ResolverError::TooManyRedirects`]: more than `max_redirects` hops.
    /// - [`ResolverError::UnexpectedStatus`]: non-2xx final status, or a 3xx
    ///   without a `Location`.
    /// - [`ResolverError::Http`]: network or TLS failure.
    pub async fn follow(
        &self,
        url: &str,
        cookie: Option<&str>,
        language: Option<&str>,
    ) -> Result<Landing, ResolverError> {
        let mut current = Url::parse(url).map_err(|e| ResolverError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        let mut chain = vec![current.to_string()];
        let mut seen: HashSet<String> = chain.iter().cloned().collect();
        let accept_language = accept_language(language);

        loop {
            let mut request = self
                .client
                .get(current.clone())
                .header(ACCEPT, ACCEPT_HTML)
                .header(ACCEPT_LANGUAGE, accept_language.clone());
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                else {
                    return Err(ResolverError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: current.to_string(),
                    });
                };
                let next = current.join(location).map_err(|e| ResolverError::InvalidUrl {
                    url: location.to_owned(),
                    reason: e.to_string(),
                })?;

                if chain.len() > self.max_redirects {
                    return Err(ResolverError::TooManyRedirects {
                        url: url.to_owned(),
                        limit: self.max_redirects,
                    });
                }
                if !seen.insert(next.to_string()) {
                    return Err(ResolverError::RedirectLoop {
                        url: next.to_string(),
                        hops: chain.len(),
                    });
                }

                tracing::debug!(from = %current, to = %next, status = status.as_u16(), "redirect hop");
                chain.push(next.to_string());
                if decode::coordinate_in_url(next.as_str(), &self.domains).is_some() {
                    return Ok(Landing {
                        final_url: next.to_string(),
                        chain,
                        body: String::new(),
                        consent: false,
                    });
                }
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(ResolverError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let body = read_body(response, self.body_limit).await?;
            let consent = current
                .host_str()
                .is_some_and(|host| self.domains.is_consent_host(host))
                || self.domains.has_consent_marker(&body);

            return Ok(Landing {
                final_url: current.to_string(),
                chain,
                body,
                consent,
            });
        }
    }

    /// First coordinate visible anywhere in a landing: the final URL, then
    /// earlier hops from last to first, then structural markers in the body.
    fn inspect(&self, landing: &Landing) -> Option<Coordinate> {
        landing
            .chain
            .iter()
            .rev()
            .find_map(|url| decode::coordinate_in_url(url, &self.domains))
            .or_else(|| {
                if landing.consent {
                    return None;
                }
                pattern::structural_candidates(&landing.body)
                    .first()
                    .map(|m| m.coordinate)
            })
    }

    /// Resolves `start_url` over HTTP.
    ///
    /// Expands the link first. A consent wall is retried once with the
    /// bypass cookie. When that still yields nothing, the expanded path (or
    /// a `cid` lookup) is probed on each configured origin in order.
    pub async fn resolve(&self, start_url: &str, language: Option<&str>) -> Attempt {
        self.run(start_url, language, None).await
    }

    /// [`Self::resolve`], reporting the expanded URL to `ctx` as soon as it is
    /// known so it outlives a timed-out attempt.
    async fn run(
        &self,
        start_url: &str,
        language: Option<&str>,
        ctx: Option<&ResolutionContext>,
    ) -> Attempt {
        let mut discovery = Discovery::default();
        let mut last_error: Option<ResolverError> = None;
        let mut tried: HashSet<String> = HashSet::new();

        match self.fetch(start_url, language, &mut tried).await {
            Ok(landing) => {
                let target = decode::strip_consent(&landing.final_url, &self.domains).into_owned();
                let coordinate = self.inspect(&landing);
                discovery.expanded_url = Some(target);
                if let Some(ctx) = ctx {
                    ctx.record(discovery.clone());
                }
                if let Some(coordinate) = coordinate {
                    return Attempt::success(Resolved::at(coordinate)).with_discovery(discovery);
                }
                if landing.consent {
                    last_error = Some(ResolverError::ConsentWall {
                        url: landing.final_url.clone(),
                    });
                }
            }
            Err(e) => {
                tracing::debug!(url = %start_url, error = %e, "redirect expansion failed");
                last_error = Some(e);
            }
        }

        let source = discovery.expanded_url.as_deref().unwrap_or(start_url);
        if let Some(path) = probe_path(source, &self.domains) {
            for origin in self.domains.origins() {
                let url = format!("{}{path}", origin.trim_end_matches('/'));
                if tried.contains(&url) {
                    continue;
                }
                tracing::debug!(%url, "probing origin");
                match self.fetch(&url, language, &mut tried).await {
                    Ok(landing) => {
                        if let Some(coordinate) = self.inspect(&landing) {
                            if !landing.consent {
                                discovery.expanded_url = Some(landing.final_url);
                            }
                            return Attempt::success(Resolved::at(coordinate))
                                .with_discovery(discovery);
                        }
                        if landing.consent {
                            last_error = Some(ResolverError::ConsentWall {
                                url: landing.final_url,
                            });
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%url, error = %e, "origin probe failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        let failure = last_error.map_or_else(
            || StrategyFailure::no_match("no coordinates after following redirects"),
            |e| e.to_failure(),
        );
        Attempt::failure(failure).with_discovery(discovery)
    }

    /// `follow`, plus one cookie-carrying resubmission when the landing is a
    /// consent wall with nothing usable on it.
    async fn fetch(
        &self,
        url: &str,
        language: Option<&str>,
        tried: &mut HashSet<String>,
    ) -> Result<Landing, ResolverError> {
        tried.insert(url.to_owned());
        let landing = self.follow(url, None, language).await?;
        tried.extend(landing.chain.iter().cloned());
        if !landing.consent || self.inspect(&landing).is_some() {
            return Ok(landing);
        }
        let Some(cookie) = self.domains.consent_bypass_cookie.as_deref() else {
            return Ok(landing);
        };

        let target = decode::strip_consent(&landing.final_url, &self.domains).into_owned();
        tracing::debug!(url = %target, "consent wall, resubmitting with bypass cookie");
        match self.follow(&target, Some(cookie), language).await {
            Ok(retry) if !retry.consent || self.inspect(&retry).is_some() => Ok(retry),
            Ok(_) => {
                tracing::warn!(url = %target, "still behind consent wall after bypass cookie");
                Ok(landing)
            }
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "consent resubmission failed");
                Ok(landing)
            }
        }
    }
}

fn accept_language(language: Option<&str>) -> HeaderValue {
    let value = match language {
        Some(lang) if lang != "en" => format!("{lang},en;q=0.8"),
        _ => "en-US,en;q=0.9".to_owned(),
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("en-US,en;q=0.9"))
}

impl Strategy for RedirectResolver {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Redirect
    }

    fn timeout(&self) -> Duration {
        self.strategy_timeout
    }

    fn attempt<'a>(&'a self, ctx: &'a ResolutionContext) -> AttemptFuture<'a> {
        Box::pin(async move {
            let language = ctx.request().language();
            self.run(ctx.request().url(), language.as_deref(), Some(ctx))
                .await
        })
    }
}
