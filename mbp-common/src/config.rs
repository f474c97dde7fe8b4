//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is read from a single TOML file. Every field has a
//! built-in default, so a missing or partial file never prevents startup.
//!
//! # Config file priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/mbp/mbp-ingest.toml`)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Batch size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metadata resolution settings
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Creation endpoint settings
    #[serde(default)]
    pub creation: CreationSettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            limits: LimitsConfig::default(),
            resolver: ResolverSettings::default(),
            creation: CreationSettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Per-batch limits, validated at parse/add time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_links")]
    pub max_links: usize,

    /// Largest accepted single file, in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_links: default_max_links(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

/// Metadata resolver settings
///
/// Base URLs are configurable so tests can point resolvers at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Timeout applied to every network-bound resolution step
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How many folder levels below a shared folder are searched for a preview file
    #[serde(default = "default_folder_depth")]
    pub folder_depth: usize,

    /// Upper bound on one whole folder search, across all listings it makes
    #[serde(default = "default_folder_search_timeout_secs")]
    pub folder_search_timeout_secs: u64,

    /// Width in pixels of generated and derived thumbnails
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    /// Drive API request budget (token bucket refill per second)
    #[serde(default = "default_drive_requests_per_second")]
    pub drive_requests_per_second: u32,

    /// Drive API key (prefer `MBP_DRIVE_API_KEY`)
    #[serde(default)]
    pub drive_api_key: Option<String>,

    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,

    #[serde(default = "default_drive_web_base")]
    pub drive_web_base: String,

    #[serde(default = "default_oembed_endpoint")]
    pub oembed_endpoint: String,

    #[serde(default = "default_video_thumbnail_base")]
    pub video_thumbnail_base: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            folder_depth: default_folder_depth(),
            folder_search_timeout_secs: default_folder_search_timeout_secs(),
            thumbnail_width: default_thumbnail_width(),
            drive_requests_per_second: default_drive_requests_per_second(),
            drive_api_key: None,
            drive_api_base: default_drive_api_base(),
            drive_web_base: default_drive_web_base(),
            oembed_endpoint: default_oembed_endpoint(),
            video_thumbnail_base: default_video_thumbnail_base(),
        }
    }
}

/// Creation endpoint settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreationSettings {
    /// Base URL of the materials service (prefer `MBP_CREATION_URL`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent with creation requests (prefer `MBP_CREATION_TOKEN`)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout; file uploads can be large
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_files() -> usize {
    20
}

fn default_max_links() -> usize {
    50
}

fn default_max_file_size_mb() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    8
}

fn default_folder_depth() -> usize {
    3
}

fn default_folder_search_timeout_secs() -> u64 {
    16
}

fn default_thumbnail_width() -> u32 {
    320
}

fn default_drive_requests_per_second() -> u32 {
    10
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_web_base() -> String {
    "https://drive.google.com".to_string()
}

fn default_oembed_endpoint() -> String {
    "https://www.youtube.com/oembed".to_string()
}

fn default_video_thumbnail_base() -> String {
    "https://img.youtube.com/vi".to_string()
}

/// Resolve which config file to read
///
/// Returns `None` when no candidate exists; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/mbp/mbp-ingest.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mbp").join("mbp-ingest.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load config with graceful degradation
///
/// A missing or unreadable file logs a warning and yields the defaults.
pub fn load_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return TomlConfig::default();
    };

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Could not load config {}: {}. Using defaults.", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Standard User-Agent for outbound HTTP clients
pub fn get_user_agent() -> String {
    format!("mbp-ingest/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [limits]
            max_links = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.limits.max_links, 10);
        assert_eq!(config.limits.max_files, 20);
        assert_eq!(config.limits.max_file_size_mb, 500);
        assert_eq!(config.resolver.folder_depth, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 5730);
        assert_eq!(config.resolver.request_timeout_secs, 8);
        assert!(config.creation.base_url.is_none());
    }

    #[test]
    fn test_user_agent_names_crate() {
        assert!(get_user_agent().starts_with("mbp-ingest/"));
    }
}
