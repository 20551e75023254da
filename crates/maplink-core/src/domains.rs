//! Origin-service domain tables: which origins to try, how consent walls
//! look, and how to get past them.
//!
//! Everything region- or language-specific lives here as data so a new
//! regional origin or consent-button language is a YAML edit.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Label text of a consent-acceptance control in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentLabel {
    /// Primary language subtag (`"en"`, `"pt"`).
    pub lang: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainTable {
    /// Origin tried first when probing (`scheme://host[:port]`).
    pub canonical_origin: String,
    /// Regional origins tried in order after the canonical one.
    #[serde(default)]
    pub alternate_origins: Vec<String>,
    /// Hosts serving consent interstitials (suffix match).
    #[serde(default)]
    pub consent_hosts: Vec<String>,
    /// Case-insensitive body substrings identifying a consent page.
    #[serde(default)]
    pub consent_body_markers: Vec<String>,
    /// `Cookie` header value sent when resubmitting past a consent wall.
    #[serde(default)]
    pub consent_bypass_cookie: Option<String>,
    #[serde(default)]
    pub consent_labels: Vec<ConsentLabel>,
    /// Hosts whose links are accepted from chat text.
    #[serde(default)]
    pub share_link_hosts: Vec<String>,
}

impl Default for DomainTable {
    fn default() -> Self {
        Self {
            canonical_origin: "https://www.google.com".to_owned(),
            alternate_origins: vec![
                "https://maps.google.co.uk".to_owned(),
                "https://maps.google.de".to_owned(),
                "https://maps.google.ca".to_owned(),
            ],
            consent_hosts: vec!["consent.google.com".to_owned()],
            consent_body_markers: vec![
                "before you continue to google".to_owned(),
                "antes de continuar para o google".to_owned(),
            ],
            consent_bypass_cookie: Some("CONSENT=YES+cb; SOCS=CAI".to_owned()),
            consent_labels: vec![
                ConsentLabel {
                    lang: "en".to_owned(),
                    text: "Accept all".to_owned(),
                },
                ConsentLabel {
                    lang: "pt".to_owned(),
                    text: "Aceitar tudo".to_owned(),
                },
            ],
            share_link_hosts: vec!["maps.app.goo.gl".to_owned(), "goo.gl".to_owned()],
        }
    }
}

impl DomainTable {
    /// Canonical origin followed by the alternates, in probe order.
    pub fn origins(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_origin.as_str())
            .chain(self.alternate_origins.iter().map(String::as_str))
    }

    /// True if `host` equals or is a subdomain of a consent host.
    #[must_use]
    pub fn is_consent_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.consent_hosts.iter().any(|h| host_matches(&host, h))
    }

    /// True if `body` carries any consent-page marker.
    #[must_use]
    pub fn has_consent_marker(&self, body: &str) -> bool {
        let lowered = body.to_ascii_lowercase();
        self.consent_body_markers
            .iter()
            .any(|m| lowered.contains(&m.to_ascii_lowercase()))
    }

    /// True if `host` is one of the accepted share-link hosts.
    #[must_use]
    pub fn is_share_link_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.share_link_hosts.iter().any(|h| host_matches(&host, h))
    }

    /// Consent labels ordered for a request: labels in `language` first, then
    /// the rest in table order.
    #[must_use]
    pub fn consent_labels_for(&self, language: Option<&str>) -> Vec<String> {
        let (preferred, rest): (Vec<&ConsentLabel>, Vec<&ConsentLabel>) = self
            .consent_labels
            .iter()
            .partition(|l| language.is_some_and(|lang| l.lang.eq_ignore_ascii_case(lang)));
        preferred
            .into_iter()
            .chain(rest)
            .map(|l| l.text.clone())
            .collect()
    }
}

fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    host == pattern || host.ends_with(&format!(".{pattern}"))
}

/// Load and validate a domain table from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_domain_table(path: &Path) -> Result<DomainTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::DomainFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let table: DomainTable = serde_yaml::from_str(&content)?;
    validate_domain_table(&table)?;
    Ok(table)
}

fn validate_domain_table(table: &DomainTable) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for origin in table.origins() {
        if !(origin.starts_with("https://") || origin.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "origin '{origin}' must start with http:// or https://"
            )));
        }
        if origin.trim_end_matches('/').matches('/').count() != 2 {
            return Err(ConfigError::Validation(format!(
                "origin '{origin}' must not carry a path"
            )));
        }
        if !seen.insert(origin.trim_end_matches('/').to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate origin: '{origin}'"
            )));
        }
    }

    for label in &table.consent_labels {
        if label.text.trim().is_empty() || label.lang.trim().is_empty() {
            return Err(ConfigError::Validation(
                "consent labels need a non-empty lang and text".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        validate_domain_table(&DomainTable::default()).unwrap();
    }

    #[test]
    fn origins_start_with_canonical() {
        let table = DomainTable::default();
        let origins: Vec<&str> = table.origins().collect();
        assert_eq!(origins[0], "https://www.google.com");
        assert_eq!(origins.len(), 4);
    }

    #[test]
    fn consent_host_matches_subdomains_only_on_label_boundary() {
        let table = DomainTable::default();
        assert!(table.is_consent_host("consent.google.com"));
        assert!(table.is_consent_host("CONSENT.GOOGLE.COM"));
        assert!(!table.is_consent_host("notconsent.google.com.evil"));
        assert!(!table.is_consent_host("www.google.com"));
    }

    #[test]
    fn consent_marker_is_case_insensitive() {
        let table = DomainTable::default();
        assert!(table.has_consent_marker("<h1>Before you continue to Google</h1>"));
        assert!(!table.has_consent_marker("<h1>Cafe Luso</h1>"));
    }

    #[test]
    fn consent_labels_prefer_request_language() {
        let table = DomainTable::default();
        assert_eq!(
            table.consent_labels_for(Some("pt")),
            vec!["Aceitar tudo".to_string(), "Accept all".to_string()]
        );
        assert_eq!(
            table.consent_labels_for(None),
            vec!["Accept all".to_string(), "Aceitar tudo".to_string()]
        );
    }

    #[test]
    fn validation_rejects_origin_with_path() {
        let table = DomainTable {
            canonical_origin: "https://www.google.com/maps".to_owned(),
            ..DomainTable::default()
        };
        assert!(matches!(
            validate_domain_table(&table),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validation_rejects_duplicate_origin() {
        let table = DomainTable {
            alternate_origins: vec!["https://WWW.google.com/".to_owned()],
            ..DomainTable::default()
        };
        assert!(matches!(
            validate_domain_table(&table),
            Err(ConfigError::Validation(ref m)) if m.contains("duplicate")
        ));
    }

    #[test]
    fn sample_domain_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/domains.yaml");
        let table = load_domain_table(&path).unwrap();
        assert_eq!(table, DomainTable::default());
    }

    #[test]
    fn yaml_table_adds_language_without_code_change() {
        let yaml = r"
canonical_origin: https://www.google.com
alternate_origins:
  - https://maps.google.es
consent_hosts: [consent.google.com]
consent_labels:
  - { lang: es, text: Aceptar todo }
";
        let table: DomainTable = serde_yaml::from_str(yaml).unwrap();
        validate_domain_table(&table).unwrap();
        assert_eq!(table.consent_labels_for(Some("es")), vec!["Aceptar todo"]);
        assert!(table.share_link_hosts.is_empty());
    }
}
