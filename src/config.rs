//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag / explicit path)
//! 2. `~/.autopost/optimizer.toml` (user)
//! 3. `/etc/autopost/optimizer.toml` (system)
//!
//! Deployment environment variables may then override individual settings
//! (see [`Config::apply_env_overrides`]). Configuration is read once at
//! startup and never re-read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::cache::tiered::{CacheConfig, DEFAULT_KEY_PREFIX};
use crate::cleanup::CleanupConfig;
use crate::stats::{DEFAULT_COST_PER_CALL, DEFAULT_LOG_INTERVAL, TrackingConfig};
use crate::{OptimizerError, Result};

/// Environment variable holding the Upstash REST token.
pub const UPSTASH_TOKEN_ENV: &str = "UPSTASH_REDIS_REST_TOKEN";

/// Optimizer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub shared: SharedSection,
    #[serde(default)]
    pub batch: BatchSection,
    #[serde(default)]
    pub cleanup: CleanupSection,
    #[serde(default)]
    pub cost_tracking: CostTrackingSection,
}

/// Tiered cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    /// Whether lookups go through the cache at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Shared tier TTL in seconds (default: 30 days).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// In-process tier TTL in seconds (default: 24 hours).
    #[serde(default = "default_memory_ttl_secs")]
    pub memory_ttl_secs: u64,
    /// In-process tier capacity (default: 10,000).
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,
    /// Shared tier key prefix (default: "analysis:").
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            memory_ttl_secs: default_memory_ttl_secs(),
            memory_max_entries: default_memory_max_entries(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_memory_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_memory_max_entries() -> u64 {
    10_000
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

/// Which store backs the shared tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedBackend {
    /// No shared tier; only the in-process tier is used.
    None,
    /// Process-local stand-in.
    #[default]
    Memory,
    /// Upstash Redis REST API.
    Upstash,
    /// Native Redis connection (requires the `redis` feature).
    Redis,
}

impl SharedBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharedBackend::None => "none",
            SharedBackend::Memory => "memory",
            SharedBackend::Upstash => "upstash",
            SharedBackend::Redis => "redis",
        }
    }
}

/// Shared tier connection settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SharedSection {
    #[serde(default)]
    pub backend: SharedBackend,
    /// Redis URL or Upstash REST base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Upstash token. Falls back to `UPSTASH_REDIS_REST_TOKEN`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl SharedSection {
    /// Upstash token from the file, falling back to the environment.
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(UPSTASH_TOKEN_ENV).ok())
    }
}

/// Batch processor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchSection {
    /// Items per handler call (default: 10).
    #[serde(default = "default_batch_size")]
    pub size: usize,
    /// Pause between slices in milliseconds (default: 100).
    #[serde(default = "default_batch_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            delay_ms: default_batch_delay_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    100
}

/// Deferred image cleanup settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupSection {
    /// Whether cleanups are scheduled at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the service exposing the delete endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the delete endpoint.
    #[serde(default = "default_delete_path")]
    pub delete_path: String,
    /// Delay used when the caller does not pick one (default: 60).
    #[serde(default = "default_delay_minutes")]
    pub default_delay_minutes: u64,
    /// Upper bound on any cleanup delay, in days (default: 1).
    #[serde(default = "default_max_storage_days")]
    pub max_storage_days: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            delete_path: default_delete_path(),
            default_delay_minutes: default_delay_minutes(),
            max_storage_days: default_max_storage_days(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_delete_path() -> String {
    "/api/upload/delete".to_string()
}

fn default_delay_minutes() -> u64 {
    60
}

fn default_max_storage_days() -> u64 {
    1
}

/// Hit/miss logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CostTrackingSection {
    /// Whether the periodic stats line is logged (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log every N-th request (default: 1000).
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
    /// Dollars saved per cache hit (default: 0.01).
    #[serde(default = "default_cost_per_call")]
    pub cost_per_call: f64,
}

impl Default for CostTrackingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            log_interval: default_log_interval(),
            cost_per_call: default_cost_per_call(),
        }
    }
}

fn default_log_interval() -> u64 {
    DEFAULT_LOG_INTERVAL
}

fn default_cost_per_call() -> f64 {
    DEFAULT_COST_PER_CALL
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .enabled(section.enabled)
            .shared_ttl(Duration::from_secs(section.ttl_secs))
            .memory_ttl(Duration::from_secs(section.memory_ttl_secs))
            .memory_max_entries(section.memory_max_entries)
            .key_prefix(section.key_prefix.clone())
    }
}

impl From<&BatchSection> for BatchConfig {
    fn from(section: &BatchSection) -> Self {
        BatchConfig::new()
            .batch_size(section.size)
            .delay(Duration::from_millis(section.delay_ms))
    }
}

impl From<&CleanupSection> for CleanupConfig {
    fn from(section: &CleanupSection) -> Self {
        CleanupConfig::new()
            .enabled(section.enabled)
            .default_delay(Duration::from_secs(
                section.default_delay_minutes.saturating_mul(60),
            ))
            .max_storage(Duration::from_secs(
                section.max_storage_days.saturating_mul(24 * 60 * 60),
            ))
    }
}

impl From<&CostTrackingSection> for TrackingConfig {
    fn from(section: &CostTrackingSection) -> Self {
        TrackingConfig::new()
            .log_enabled(section.enabled)
            .log_interval(section.log_interval)
            .cost_per_call(section.cost_per_call)
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.autopost/optimizer.toml`
    /// 3. `/etc/autopost/optimizer.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Parse and validate a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OptimizerError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            OptimizerError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(OptimizerError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".autopost").join("optimizer.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/autopost/optimizer.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(OptimizerError::Configuration(
            "No config file found. Create ~/.autopost/optimizer.toml or /etc/autopost/optimizer.toml"
                .to_string(),
        ))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        CacheConfig::from(&self.cache).validate()?;

        if self.batch.size == 0 {
            return Err(OptimizerError::Configuration(
                "batch.size must be greater than 0".to_string(),
            ));
        }
        if self.cost_tracking.log_interval == 0 {
            return Err(OptimizerError::Configuration(
                "cost_tracking.log_interval must be greater than 0".to_string(),
            ));
        }
        match self.shared.backend {
            SharedBackend::Upstash | SharedBackend::Redis if self.shared.url.is_none() => {
                Err(OptimizerError::Configuration(format!(
                    "shared.url is required for the {} backend",
                    self.shared.backend.as_str()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply deployment overrides read through `lookup`.
    ///
    /// - `COST_OPTIMIZATION_ENABLED` → `cache.enabled`
    /// - `AUTO_DELETE_IMAGES` → `cleanup.enabled`
    /// - `NEXT_PUBLIC_BASE_URL` → `cleanup.base_url`
    /// - `NODE_ENV` → `cost_tracking.enabled` (only in `production`)
    /// - `RAILWAY_REDIS_URL` / `REDIS_URL` → redis backend
    /// - `UPSTASH_REDIS_REST_URL` → upstash backend (when no redis URL is set)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("COST_OPTIMIZATION_ENABLED") {
            self.cache.enabled = v == "true";
        }
        if let Some(v) = lookup("AUTO_DELETE_IMAGES") {
            self.cleanup.enabled = v == "true";
        }
        if let Some(v) = lookup("NEXT_PUBLIC_BASE_URL") {
            self.cleanup.base_url = v;
        }
        if let Some(v) = lookup("NODE_ENV") {
            self.cost_tracking.enabled = v == "production";
        }

        let redis_url = lookup("RAILWAY_REDIS_URL").or_else(|| lookup("REDIS_URL"));
        if let Some(url) = redis_url {
            self.shared.backend = SharedBackend::Redis;
            self.shared.url = Some(url);
        } else if let Some(url) = lookup("UPSTASH_REDIS_REST_URL") {
            self.shared.backend = SharedBackend::Upstash;
            self.shared.url = Some(url);
        }
    }
}
