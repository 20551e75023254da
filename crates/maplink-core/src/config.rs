use std::path::PathBuf;
use std::time::Duration;

use crate::domains::{load_domain_table, DomainTable};
use crate::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Resolver settings: timeouts, budgets, external endpoints and the domain
/// table. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub log_level: String,
    pub user_agent: String,
    pub http_timeout: Duration,
    pub max_redirects: usize,
    pub redirect_strategy_timeout: Duration,
    pub render_enabled: bool,
    pub render_timeout: Duration,
    pub render_settle: Duration,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocode_timeout: Duration,
    pub geocode_interval: Duration,
    pub geocode_region_hint: Option<String>,
    pub geocode_min_importance: Option<f64>,
    pub total_budget: Duration,
    pub domains_path: Option<PathBuf>,
    pub domains: DomainTable,
}

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "maplink/0.1 (coordinate-resolver)";

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            http_timeout: Duration::from_secs(10),
            max_redirects: 10,
            redirect_strategy_timeout: Duration::from_secs(20),
            render_enabled: true,
            render_timeout: Duration::from_secs(10),
            render_settle: Duration::from_millis(3000),
            geocoder_url: DEFAULT_GEOCODER_URL.to_owned(),
            geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_owned(),
            geocode_timeout: Duration::from_secs(15),
            geocode_interval: Duration::from_millis(1000),
            geocode_region_hint: None,
            geocode_min_importance: None,
            total_budget: Duration::from_secs(45),
            domains_path: None,
            domains: DomainTable::default(),
        }
    }
}

/// Load resolver configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid or the domain table file
/// cannot be loaded.
pub fn load_config() -> Result<ResolverConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config_from_env()
}

/// Load resolver configuration from environment variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid or the domain table file
/// cannot be loaded.
pub fn load_config_from_env() -> Result<ResolverConfig, ConfigError> {
    build_config(|key| std::env::var(key))
}

/// Build configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can use a plain map.
fn build_config<F>(lookup: F) -> Result<ResolverConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_secs = |var: &str, default: &str| -> Result<Duration, ConfigError> {
        let secs = parse_u64(var, default)?;
        if secs == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(Duration::from_secs(secs))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let log_level = or_default("MAPLINK_LOG_LEVEL", "info");
    let user_agent = or_default("MAPLINK_USER_AGENT", DEFAULT_USER_AGENT);
    let http_timeout = parse_secs("MAPLINK_HTTP_TIMEOUT_SECS", "10")?;
    let max_redirects = usize::try_from(parse_u64("MAPLINK_MAX_REDIRECTS", "10")?)
        .map_err(|e| invalid("MAPLINK_MAX_REDIRECTS", e.to_string()))?;
    let redirect_strategy_timeout = parse_secs("MAPLINK_REDIRECT_STRATEGY_TIMEOUT_SECS", "20")?;

    let render_enabled = parse_bool("MAPLINK_RENDER_ENABLED", "true")?;
    let render_timeout = parse_secs("MAPLINK_RENDER_TIMEOUT_SECS", "10")?;
    let render_settle = Duration::from_millis(parse_u64("MAPLINK_RENDER_SETTLE_MS", "3000")?);

    let geocoder_url = or_default("MAPLINK_GEOCODER_URL", DEFAULT_GEOCODER_URL);
    let geocoder_user_agent =
        or_default("MAPLINK_GEOCODER_USER_AGENT", DEFAULT_GEOCODER_USER_AGENT);
    let geocode_timeout = parse_secs("MAPLINK_GEOCODE_TIMEOUT_SECS", "15")?;
    let geocode_interval =
        Duration::from_millis(parse_u64("MAPLINK_GEOCODE_INTERVAL_MS", "1000")?);
    let geocode_region_hint = optional("MAPLINK_GEOCODE_REGION_HINT");
    let geocode_min_importance = optional("MAPLINK_GEOCODE_MIN_IMPORTANCE")
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|e| invalid("MAPLINK_GEOCODE_MIN_IMPORTANCE", e.to_string()))
        })
        .transpose()?;

    let total_budget = parse_secs("MAPLINK_TOTAL_BUDGET_SECS", "45")?;

    let domains_path = optional("MAPLINK_DOMAINS_PATH").map(PathBuf::from);
    let domains = match &domains_path {
        Some(path) => load_domain_table(path)?,
        None => DomainTable::default(),
    };

    Ok(ResolverConfig {
        log_level,
        user_agent,
        http_timeout,
        max_redirects,
        redirect_strategy_timeout,
        render_enabled,
        render_timeout,
        render_settle,
        geocoder_url,
        geocoder_user_agent,
        geocode_timeout,
        geocode_interval,
        geocode_region_hint,
        geocode_min_importance,
        total_budget,
        domains_path,
        domains,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
