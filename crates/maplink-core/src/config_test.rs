use std::collections::HashMap;
use std::env::VarError;
use std::io::Write;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn build_config_defaults_match_default_impl() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_config(lookup_from_map(&map)).unwrap();
    let default = ResolverConfig::default();
    assert_eq!(cfg.log_level, default.log_level);
    assert_eq!(cfg.user_agent, default.user_agent);
    assert_eq!(cfg.http_timeout, default.http_timeout);
    assert_eq!(cfg.max_redirects, default.max_redirects);
    assert_eq!(cfg.redirect_strategy_timeout, default.redirect_strategy_timeout);
    assert_eq!(cfg.render_enabled, default.render_enabled);
    assert_eq!(cfg.render_timeout, default.render_timeout);
    assert_eq!(cfg.render_settle, default.render_settle);
    assert_eq!(cfg.geocoder_url, default.geocoder_url);
    assert_eq!(cfg.geocoder_user_agent, default.geocoder_user_agent);
    assert_eq!(cfg.geocode_timeout, default.geocode_timeout);
    assert_eq!(cfg.geocode_interval, default.geocode_interval);
    assert_eq!(cfg.geocode_region_hint, None);
    assert_eq!(cfg.geocode_min_importance, None);
    assert_eq!(cfg.total_budget, default.total_budget);
    assert_eq!(cfg.domains, default.domains);
}

#[test]
fn build_config_reads_overrides() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_HTTP_TIMEOUT_SECS", "3");
    map.insert("MAPLINK_MAX_REDIRECTS", "4");
    map.insert("MAPLINK_RENDER_ENABLED", "false");
    map.insert("MAPLINK_RENDER_SETTLE_MS", "250");
    map.insert("MAPLINK_GEOCODE_REGION_HINT", " Portugal ");
    map.insert("MAPLINK_GEOCODE_MIN_IMPORTANCE", "0.25");
    map.insert("MAPLINK_TOTAL_BUDGET_SECS", "30");
    let cfg = build_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.http_timeout, Duration::from_secs(3));
    assert_eq!(cfg.max_redirects, 4);
    assert!(!cfg.render_enabled);
    assert_eq!(cfg.render_settle, Duration::from_millis(250));
    assert_eq!(cfg.geocode_region_hint.as_deref(), Some("Portugal"));
    assert_eq!(cfg.geocode_min_importance, Some(0.25));
    assert_eq!(cfg.total_budget, Duration::from_secs(30));
}

#[test]
fn build_config_blank_optional_is_none() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_GEOCODE_REGION_HINT", "   ");
    let cfg = build_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.geocode_region_hint.is_none());
}

#[test]
fn build_config_rejects_non_numeric_timeout() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_HTTP_TIMEOUT_SECS", "not-a-number");
    let result = build_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "MAPLINK_HTTP_TIMEOUT_SECS"),
        "expected InvalidEnvVar(MAPLINK_HTTP_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn build_config_rejects_zero_budget() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_TOTAL_BUDGET_SECS", "0");
    let result = build_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "MAPLINK_TOTAL_BUDGET_SECS"),
        "expected InvalidEnvVar(MAPLINK_TOTAL_BUDGET_SECS), got: {result:?}"
    );
}

#[test]
fn build_config_rejects_bad_boolean() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_RENDER_ENABLED", "maybe");
    let result = build_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "MAPLINK_RENDER_ENABLED"),
        "expected InvalidEnvVar(MAPLINK_RENDER_ENABLED), got: {result:?}"
    );
}

#[test]
fn build_config_rejects_bad_min_importance() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_GEOCODE_MIN_IMPORTANCE", "high");
    let result = build_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "MAPLINK_GEOCODE_MIN_IMPORTANCE"),
        "expected InvalidEnvVar(MAPLINK_GEOCODE_MIN_IMPORTANCE), got: {result:?}"
    );
}

#[test]
fn build_config_loads_domain_table_from_path() {
    let path = std::env::temp_dir().join(format!("maplink-domains-{}.yaml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "canonical_origin: https://www.google.pt\nalternate_origins: [https://maps.google.es]"
    )
    .unwrap();

    let path_str = path.display().to_string();
    let mut map = HashMap::new();
    map.insert("MAPLINK_DOMAINS_PATH", path_str.as_str());
    let cfg = build_config(lookup_from_map(&map)).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.domains.canonical_origin, "https://www.google.pt");
    assert_eq!(cfg.domains.alternate_origins, vec!["https://maps.google.es"]);
    assert_eq!(cfg.domains_path.as_deref(), Some(path.as_path()));
}

#[test]
fn build_config_reports_missing_domain_file() {
    let mut map = HashMap::new();
    map.insert("MAPLINK_DOMAINS_PATH", "/nonexistent/maplink/domains.yaml");
    let result = build_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::DomainFileIo { .. })),
        "expected DomainFileIo, got: {result:?}"
    );
}
