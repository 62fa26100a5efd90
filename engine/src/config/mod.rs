//! Configuration management
//!
//! This module handles loading, validation, and management of the FitPlan
//! configuration. Configuration is stored in TOML format at
//! ~/.fitplan/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, output directory, prompt templates, prompt language
//! - **gemini**: Remote model endpoint and model name
//! - **throttle**: Shared request rate towards the remote model
//! - **retry**: Attempt budget and backoff for rate-limited calls
//! - **cache**: Response cache capacity
//!
//! # Environment Overrides
//!
//! After the file is loaded, the following variables override it:
//! `GEMINI_MODEL`, `GEMINI_RPM`, `GEMINI_MIN_INTERVAL_SECONDS`,
//! `GEMINI_MAX_ATTEMPTS`, `GEMINI_BACKOFF_BASE_SECONDS`,
//! `GEMINI_BACKOFF_CAP_SECONDS`, `FITPLAN_CACHE_MAX_ENTRIES`.
//! Values that do not parse are ignored with a warning.
//!
//! # Examples
//!
//! ```no_run
//! use fitplan_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Model: {}", config.gemini.model);
//! println!("Min interval: {:?}", config.throttle.min_interval());
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Core settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where generated plans are written (supports ~ expansion)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory with `segmentation.txt`, `meal_plan.txt` and
    /// `training_plan.txt`. Built-in templates are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,

    /// Language of the labels interpolated into prompts
    #[serde(default)]
    pub language: Language,
}

/// Prompt label language
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Slovak
    #[default]
    Sk,
    /// English
    En,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    // Note: API key comes from GEMINI_API_KEY or the OS keychain, not from config
}

/// Longest throttle interval or backoff accepted from configuration (one day)
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Outbound request spacing, shared by every caller in the process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Requests per minute allowed against the remote quota
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: f64,

    /// Explicit minimum spacing in seconds; overrides the rate when > 0
    #[serde(default)]
    pub min_interval_secs: f64,
}

/// Retry budget for rate-limited calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles after every failure
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: f64,

    /// Upper bound for the exponential part of the backoff
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: f64,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached responses (least recently used are evicted).
    /// `0` keeps every response for the process lifetime.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("~/.fitplan/output")
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

fn default_requests_per_minute() -> f64 {
    5.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    5.0
}

fn default_backoff_cap() -> f64 {
    60.0
}

fn default_cache_max_entries() -> usize {
    1024
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            prompts_dir: None,
            language: Language::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            min_interval_secs: 0.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            backoff_cap_secs: default_backoff_cap(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
        }
    }
}

impl ThrottleConfig {
    /// Minimum spacing between the starts of two outbound calls.
    ///
    /// `min_interval_secs` wins when positive; otherwise `60 / rpm`, with
    /// the rate floored at one request per minute. The result never
    /// exceeds `MAX_INTERVAL_SECS`, even for an unvalidated config.
    pub fn min_interval(&self) -> Duration {
        if self.min_interval_secs > 0.0 {
            return Duration::from_secs_f64(self.min_interval_secs.min(MAX_INTERVAL_SECS));
        }
        let rpm = self.requests_per_minute.max(1.0);
        Duration::from_secs_f64(60.0 / rpm)
    }
}

impl Config {
    /// Load configuration from the default location (~/.fitplan/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Environment overrides are applied after loading, then the result is
    /// validated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides();
        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        // The file keeps the unexpanded defaults; overrides stay in the env.
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Created default configuration at {:?}", path);

        let mut config = config;
        config.apply_env_overrides();
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.fitplan/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".fitplan").join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            self.gemini.model = model.trim().to_string();
        }
        if let Some(rpm) = parse_override::<f64>(&lookup, "GEMINI_RPM") {
            self.throttle.requests_per_minute = rpm;
        }
        if let Some(secs) = parse_override::<f64>(&lookup, "GEMINI_MIN_INTERVAL_SECONDS") {
            self.throttle.min_interval_secs = secs;
        }
        if let Some(attempts) = parse_override::<u32>(&lookup, "GEMINI_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts;
        }
        if let Some(base) = parse_override::<f64>(&lookup, "GEMINI_BACKOFF_BASE_SECONDS") {
            self.retry.backoff_base_secs = base;
        }
        if let Some(cap) = parse_override::<f64>(&lookup, "GEMINI_BACKOFF_CAP_SECONDS") {
            self.retry.backoff_cap_secs = cap;
        }
        if let Some(entries) = parse_override::<usize>(&lookup, "FITPLAN_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = entries;
        }
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and numeric ranges
    /// - Clamps `max_attempts` to at least one attempt
    /// - Expands ~ in paths
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` describing the first invalid field.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.gemini.model.trim().is_empty() {
            return Err(EngineError::Config("gemini.model must not be empty".to_string()));
        }

        if !self.throttle.requests_per_minute.is_finite() || self.throttle.requests_per_minute <= 0.0
        {
            return Err(EngineError::Config(
                "throttle.requests_per_minute must be greater than 0".to_string(),
            ));
        }
        let min_interval = self.throttle.min_interval_secs;
        if !min_interval.is_finite() || !(0.0..=MAX_INTERVAL_SECS).contains(&min_interval) {
            return Err(EngineError::Config(format!(
                "throttle.min_interval_secs must be between 0 and {} seconds, got {}",
                MAX_INTERVAL_SECS, min_interval
            )));
        }

        if self.retry.max_attempts == 0 {
            tracing::warn!("retry.max_attempts is 0, using a single attempt");
            self.retry.max_attempts = 1;
        }
        let base = self.retry.backoff_base_secs;
        let cap = self.retry.backoff_cap_secs;
        if !base.is_finite() || base < 0.0 || !cap.is_finite() || cap < 0.0 {
            return Err(EngineError::Config(
                "retry backoff values must be non-negative numbers".to_string(),
            ));
        }
        if base > MAX_INTERVAL_SECS || cap > MAX_INTERVAL_SECS {
            return Err(EngineError::Config(format!(
                "retry backoff values must not exceed {} seconds",
                MAX_INTERVAL_SECS
            )));
        }
        if cap < base {
            return Err(EngineError::Config(format!(
                "retry.backoff_cap_secs ({}) must be >= retry.backoff_base_secs ({})",
                cap, base
            )));
        }

        self.core.output_dir = expand_path(&self.core.output_dir)?;
        if let Some(dir) = &self.core.prompts_dir {
            self.core.prompts_dir = Some(expand_path(dir)?);
        }

        Ok(())
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}='{}'", key, raw);
            None
        }
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_creation() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.core.language, Language::Sk);
        assert_eq!(config.gemini.model, "gemini-2.5-flash-lite");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_base_secs, 5.0);
        assert_eq!(config.retry.backoff_cap_secs, 60.0);
        assert_eq!(config.cache.max_entries, 1024);
    }

    #[test]
    fn test_min_interval_from_rpm() {
        let throttle = ThrottleConfig::default();
        assert_eq!(throttle.min_interval(), Duration::from_secs(12));
    }

    #[test]
    fn test_explicit_min_interval_wins() {
        let throttle = ThrottleConfig {
            requests_per_minute: 5.0,
            min_interval_secs: 2.5,
        };
        assert_eq!(throttle.min_interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_rpm_floored_at_one() {
        let throttle = ThrottleConfig {
            requests_per_minute: 0.5,
            min_interval_secs: 0.0,
        };
        assert_eq!(throttle.min_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("GEMINI_RPM", "10"),
            ("GEMINI_MAX_ATTEMPTS", "5"),
            ("GEMINI_BACKOFF_BASE_SECONDS", "1.5"),
            ("GEMINI_BACKOFF_CAP_SECONDS", "30"),
            ("FITPLAN_CACHE_MAX_ENTRIES", "0"),
        ]));

        assert_eq!(config.gemini.model, "gemini-2.5-pro");
        assert_eq!(config.throttle.requests_per_minute, 10.0);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_base_secs, 1.5);
        assert_eq!(config.retry.backoff_cap_secs, 30.0);
        assert_eq!(config.cache.max_entries, 0);
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[("GEMINI_RPM", "fast"), ("GEMINI_MAX_ATTEMPTS", "")]));
        assert_eq!(config.throttle.requests_per_minute, 5.0);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        config.validate_and_process().unwrap();
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.core.log_level = "loud".to_string();
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.throttle.requests_per_minute = 0.0;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.retry.backoff_cap_secs = 1.0;
        assert!(config.validate_and_process().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_intervals() {
        let mut config = Config::default();
        config.throttle.min_interval_secs = 1e300;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.throttle.min_interval_secs = MAX_INTERVAL_SECS + 1.0;
        assert!(config.validate_and_process().is_err());

        let mut config = Config::default();
        config.retry.backoff_base_secs = 1e300;
        config.retry.backoff_cap_secs = 1e300;
        let err = config.validate_and_process().unwrap_err();
        assert!(err.to_string().contains("must not exceed"));

        let mut config = Config::default();
        config.throttle.min_interval_secs = MAX_INTERVAL_SECS;
        config.retry.backoff_cap_secs = MAX_INTERVAL_SECS;
        assert!(config.validate_and_process().is_ok());
    }

    #[test]
    fn test_min_interval_saturates_without_validation() {
        let throttle = ThrottleConfig {
            requests_per_minute: 5.0,
            min_interval_secs: 1e300,
        };
        assert_eq!(
            throttle.min_interval(),
            Duration::from_secs_f64(MAX_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = expand_path(&PathBuf::from("~/test")).unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.gemini.model, deserialized.gemini.model);
        assert_eq!(config.cache.max_entries, deserialized.cache.max_entries);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[throttle]
requests_per_minute = 15

[core]
language = "en"
"#,
        )
        .unwrap();
        assert_eq!(config.throttle.requests_per_minute, 15.0);
        assert_eq!(config.core.language, Language::En);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.gemini.base_url, default_gemini_base_url());
    }
}
