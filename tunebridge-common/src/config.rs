//! Configuration loading for tunebridge
//!
//! Process-wide configuration is loaded once at startup and passed
//! explicitly into the components that need it; nothing reads settings
//! ad hoc mid-run. Resolution priority for every key:
//!
//! 1. Environment variable (`TUNEBRIDGE_*`)
//! 2. TOML config file (`~/.config/tunebridge/config.toml` by default)
//! 3. Compiled default

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Matching engine tuning
///
/// The acceptance threshold and margin are deliberate design parameters,
/// not constants: catalogs are full of remasters and duplicate uploads,
/// and different libraries tolerate different false-positive rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum top score for a Matched result (default 0.85)
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,
    /// Minimum gap between the top and second-best score (default 0.05)
    #[serde(default = "default_margin_threshold")]
    pub margin_threshold: f64,
    /// Duration difference treated as "the same recording", in seconds
    /// (default 3)
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            accept_threshold: default_accept_threshold(),
            margin_threshold: default_margin_threshold(),
            duration_tolerance_secs: default_duration_tolerance(),
        }
    }
}

/// Outbound call retry/pacing tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Maximum attempts per call, first try included (default 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds (default 500)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Steady-state request pacing against the destination API
    /// (default 2 requests/second)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Credential parameters consumed only by the session collaborator that
/// establishes authenticated clients; the import engine never touches
/// these directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Source service OAuth client id
    pub source_client_id: Option<String>,
    /// Source service OAuth client secret
    pub source_client_secret: Option<String>,
    /// Source service OAuth redirect URI
    pub source_redirect_uri: Option<String>,
}

/// Top-level tunebridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Destination catalog API base URL
    #[serde(default = "default_destination_base_url")]
    pub destination_base_url: String,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub invoker: InvokerConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination_base_url: default_destination_base_url(),
            matcher: MatcherConfig::default(),
            invoker: InvokerConfig::default(),
            credentials: CredentialConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with ENV -> TOML -> default resolution
    ///
    /// `explicit_path` (typically from the CLI) takes precedence over the
    /// platform config path; a missing file is not an error, it just
    /// means TOML contributes nothing.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = explicit_path
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let content = std::fs::read_to_string(p)?;
                let parsed: Config = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {}", p.display(), e)))?;
                debug!(path = %p.display(), "Loaded TOML config");
                parsed
            }
            Some(ref p) if explicit_path.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            _ => Config::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_string("TUNEBRIDGE_DEST_BASE_URL") {
            self.destination_base_url = url;
        }
        if let Some(v) = env_parse::<f64>("TUNEBRIDGE_ACCEPT_THRESHOLD") {
            self.matcher.accept_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("TUNEBRIDGE_MARGIN_THRESHOLD") {
            self.matcher.margin_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("TUNEBRIDGE_DURATION_TOLERANCE_SECS") {
            self.matcher.duration_tolerance_secs = v;
        }
        if let Some(v) = env_parse::<u32>("TUNEBRIDGE_MAX_ATTEMPTS") {
            self.invoker.max_attempts = v;
        }
        if let Some(v) = env_parse::<u64>("TUNEBRIDGE_BASE_BACKOFF_MS") {
            self.invoker.base_backoff_ms = v;
        }
        if let Some(v) = env_string("TUNEBRIDGE_SOURCE_CLIENT_ID") {
            self.credentials.source_client_id = Some(v);
        }
        if let Some(v) = env_string("TUNEBRIDGE_SOURCE_CLIENT_SECRET") {
            self.credentials.source_client_secret = Some(v);
        }
        if let Some(v) = env_string("TUNEBRIDGE_SOURCE_REDIRECT_URI") {
            self.credentials.source_redirect_uri = Some(v);
        }
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matcher.accept_threshold) {
            return Err(Error::Config(format!(
                "accept_threshold must be in [0.0, 1.0], got {}",
                self.matcher.accept_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.matcher.margin_threshold) {
            return Err(Error::Config(format!(
                "margin_threshold must be in [0.0, 1.0], got {}",
                self.matcher.margin_threshold
            )));
        }
        if self.invoker.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.invoker.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform config file path: `<config dir>/tunebridge/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunebridge").join("config.toml"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

fn default_accept_threshold() -> f64 {
    0.85
}

fn default_margin_threshold() -> f64 {
    0.05
}

fn default_duration_tolerance() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_destination_base_url() -> String {
    "https://api.tidal.com/v1".to_string()
}
