//! TOML Configuration File Support
//!
//! Configuration for the feed client, loaded from
//! `~/.config/feedstream/feedstream.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables (`FEEDSTREAM_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/feedstream/feedstream.toml` (typically `~/.config/feedstream/feedstream.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [client]
//! base_url = "http://localhost:8080/api"
//! namespace = "main"
//! timeout_ms = 30000
//! user_agent = "feedstream/0.1"
//!
//! [retry]
//! attempts = 3
//! delay_ms = 500
//!
//! [metadata]
//! ttl_secs = 300
//!
//! [paging]
//! max_pages = 50
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ClientConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Client section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Service root URL
    pub base_url: Option<String>,

    /// Namespace segment
    pub namespace: Option<String>,

    /// Connect timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// User-Agent header
    pub user_agent: Option<String>,
}

/// Retry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    /// Total attempts for not-ready entities
    pub attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    pub delay_ms: Option<u64>,

    /// Statuses treated as not-ready
    pub not_ready_statuses: Option<Vec<u16>>,
}

/// Metadata cache section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataToml {
    /// Cache time-to-live in seconds
    pub ttl_secs: Option<u64>,
}

/// Paging section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingToml {
    /// Maximum pages per query (0 = unlimited)
    pub max_pages: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedstreamToml {
    /// Client configuration section
    pub client: ClientToml,

    /// Retry configuration section
    pub retry: RetryToml,

    /// Metadata cache configuration section
    pub metadata: MetadataToml,

    /// Paging configuration section
    pub paging: PagingToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct FeedstreamConfig {
    /// Settings handed to the feed client
    pub client: ClientConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for FeedstreamConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl FeedstreamConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty base URL,
    /// an empty namespace or zero retry attempts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "client.base_url must not be empty".to_string(),
            ));
        }
        if self.client.namespace.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "client.namespace must not be empty".to_string(),
            ));
        }
        if self.client.retry.attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/feedstream/feedstream.toml` or
/// `~/.config/feedstream/feedstream.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("feedstream").join("feedstream.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the merged values fail validation. A missing config file is not an error.
pub fn load_config() -> Result<FeedstreamConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<FeedstreamConfig, ConfigError> {
    let mut config = FeedstreamConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: FeedstreamToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

fn max_pages(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut FeedstreamConfig, toml: &FeedstreamToml) {
    let client = &mut config.client;

    if let Some(ref url) = toml.client.base_url {
        client.base_url.clone_from(url);
    }
    if let Some(ref namespace) = toml.client.namespace {
        client.namespace.clone_from(namespace);
    }
    if let Some(timeout) = toml.client.timeout_ms {
        client.timeout = Duration::from_millis(timeout);
    }
    if let Some(ref agent) = toml.client.user_agent {
        client.user_agent.clone_from(agent);
    }

    if let Some(attempts) = toml.retry.attempts {
        client.retry.attempts = attempts;
    }
    if let Some(delay) = toml.retry.delay_ms {
        client.retry.delay = Duration::from_millis(delay);
    }
    if let Some(ref statuses) = toml.retry.not_ready_statuses {
        client.retry.not_ready_statuses.clone_from(statuses);
    }

    if let Some(ttl) = toml.metadata.ttl_secs {
        client.metadata_ttl = Duration::from_secs(ttl);
    }

    if let Some(pages) = toml.paging.max_pages {
        client.max_pages = max_pages(pages);
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut FeedstreamConfig) {
    let client = &mut config.client;
    let mut from_env = false;

    if let Ok(url) = std::env::var("FEEDSTREAM_BASE_URL") {
        client.base_url = url;
        from_env = true;
    }
    if let Ok(namespace) = std::env::var("FEEDSTREAM_NAMESPACE") {
        client.namespace = namespace;
        from_env = true;
    }
    if let Ok(timeout) = std::env::var("FEEDSTREAM_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            client.timeout = Duration::from_millis(ms);
            from_env = true;
        }
    }
    if let Ok(agent) = std::env::var("FEEDSTREAM_USER_AGENT") {
        client.user_agent = agent;
        from_env = true;
    }
    if let Ok(attempts) = std::env::var("FEEDSTREAM_RETRY_ATTEMPTS") {
        if let Ok(n) = attempts.parse::<u32>() {
            client.retry.attempts = n;
            from_env = true;
        }
    }
    if let Ok(delay) = std::env::var("FEEDSTREAM_RETRY_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            client.retry.delay = Duration::from_millis(ms);
            from_env = true;
        }
    }
    if let Ok(ttl) = std::env::var("FEEDSTREAM_METADATA_TTL_SECS") {
        if let Ok(secs) = ttl.parse::<u64>() {
            client.metadata_ttl = Duration::from_secs(secs);
            from_env = true;
        }
    }
    if let Ok(pages) = std::env::var("FEEDSTREAM_MAX_PAGES") {
        if let Ok(n) = pages.parse::<usize>() {
            client.max_pages = max_pages(n);
            from_env = true;
        }
    }

    if from_env {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Namespace override
    pub namespace: Option<String>,

    /// Connect timeout override (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Page limit override (0 = unlimited)
    pub max_pages: Option<usize>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set namespace override
    #[must_use]
    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set page limit override
    #[must_use]
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overridden values
    /// fail validation.
    pub fn apply(&self, config: &mut FeedstreamConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some()
            || self.namespace.is_some()
            || self.timeout_ms.is_some()
            || self.max_pages.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.client.base_url.clone_from(url);
        }
        if let Some(ref namespace) = self.namespace {
            config.client.namespace.clone_from(namespace);
        }
        if let Some(timeout) = self.timeout_ms {
            config.client.timeout = Duration::from_millis(timeout);
        }
        if let Some(pages) = self.max_pages {
            config.client.max_pages = max_pages(pages);
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
