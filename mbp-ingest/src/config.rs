//! Configuration resolution for mbp-ingest
//!
//! Secrets and endpoints resolve with ENV → TOML priority; the creation URL
//! additionally accepts a command-line override ahead of both.

use mbp_common::config::{LimitsConfig, TomlConfig};
use mbp_common::{Error, Result};
use tracing::{info, warn};

pub const DRIVE_API_KEY_ENV: &str = "MBP_DRIVE_API_KEY";
pub const CREATION_TOKEN_ENV: &str = "MBP_CREATION_TOKEN";
pub const CREATION_URL_ENV: &str = "MBP_CREATION_URL";

/// Per-batch admission limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_files: usize,
    pub max_links: usize,
    pub max_file_size_bytes: u64,
}

impl IngestLimits {
    pub fn from_settings(settings: &LimitsConfig) -> Self {
        Self {
            max_files: settings.max_files,
            max_links: settings.max_links,
            max_file_size_bytes: settings.max_file_size_mb.saturating_mul(1024 * 1024),
        }
    }
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self::from_settings(&LimitsConfig::default())
    }
}

/// Resolve the Drive API key
///
/// **Priority:** ENV → TOML. Absence is not an error: cloud resolvers then
/// fall back to heuristic titles and derived thumbnails.
pub fn resolve_drive_api_key(toml_config: &TomlConfig) -> Option<String> {
    resolve_secret(
        "Drive API key",
        DRIVE_API_KEY_ENV,
        toml_config.resolver.drive_api_key.as_deref(),
    )
}

/// Resolve the creation endpoint bearer token (ENV → TOML)
pub fn resolve_creation_token(toml_config: &TomlConfig) -> Option<String> {
    resolve_secret(
        "Creation API token",
        CREATION_TOKEN_ENV,
        toml_config.creation.api_token.as_deref(),
    )
}

/// Resolve the creation endpoint base URL
///
/// **Priority:** CLI → ENV → TOML
pub fn resolve_creation_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    if let Some(url) = cli_arg.filter(|u| is_valid_key(u)) {
        info!("Creation URL taken from command line");
        return Ok(url.trim().trim_end_matches('/').to_string());
    }

    if let Some(url) = resolve_secret(
        "Creation URL",
        CREATION_URL_ENV,
        toml_config.creation.base_url.as_deref(),
    ) {
        return Ok(url.trim().trim_end_matches('/').to_string());
    }

    Err(Error::Config(format!(
        "Creation endpoint not configured. Please configure using one of:\n\
         1. Command line: --creation-url https://materials.example.org/api\n\
         2. Environment: {}=https://materials.example.org/api\n\
         3. TOML config: [creation] base_url = \"https://materials.example.org/api\"",
        CREATION_URL_ENV
    )))
}

fn resolve_secret(label: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", label);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(value.to_string());
    }

    None
}

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_limits_convert_megabytes() {
        let limits = IngestLimits::default();
        assert_eq!(limits.max_files, 20);
        assert_eq!(limits.max_links, 50);
        assert_eq!(limits.max_file_size_bytes, 500 * 1024 * 1024);
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key(""));
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml_token() {
        let mut config = TomlConfig::default();
        config.creation.api_token = Some("from-toml".into());

        std::env::set_var(CREATION_TOKEN_ENV, "from-env");
        assert_eq!(resolve_creation_token(&config).as_deref(), Some("from-env"));

        std::env::remove_var(CREATION_TOKEN_ENV);
        assert_eq!(resolve_creation_token(&config).as_deref(), Some("from-toml"));
    }

    #[test]
    #[serial]
    fn test_missing_drive_key_is_none() {
        std::env::remove_var(DRIVE_API_KEY_ENV);
        assert!(resolve_drive_api_key(&TomlConfig::default()).is_none());
    }

    #[test]
    #[serial]
    fn test_creation_url_priority() {
        let mut config = TomlConfig::default();
        config.creation.base_url = Some("https://toml.example/api/".into());
        std::env::remove_var(CREATION_URL_ENV);

        assert_eq!(
            resolve_creation_url(Some("https://cli.example/api"), &config).unwrap(),
            "https://cli.example/api"
        );
        assert_eq!(
            resolve_creation_url(None, &config).unwrap(),
            "https://toml.example/api"
        );
        assert!(resolve_creation_url(None, &TomlConfig::default()).is_err());
    }
}
