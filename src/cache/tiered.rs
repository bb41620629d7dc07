//! Tiered analysis cache.
//!
//! [`CostOptimizer::resolve`] answers an analysis request from the fastest
//! tier that has it:
//!
//! ```text
//! buffers ──► fingerprint ──► memory tier ──► shared tier ──► compute
//!                               │ hit           │ hit            │ ok
//!                               ▼               ▼                ▼
//!                             return     promote + return   write both tiers
//!                                                           + return
//! ```
//!
//! Lookups are strictly sequential within one call. Tier failures are logged
//! and treated as misses; only an error from the caller's computation reaches
//! the caller.
//!
//! Concurrent calls for the same fingerprint are not coalesced: each may miss
//! and run its own computation, and the last shared-tier write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::memory::{DEFAULT_MEMORY_MAX_ENTRIES, DEFAULT_MEMORY_TTL, MemoryTier};
use super::shared::{DEFAULT_SHARED_TTL, SharedTier};
use crate::fingerprint::{Fingerprint, derive_fingerprint};
use crate::stats::{CostTracker, OptimizationStats};
use crate::telemetry;
use crate::{OptimizerError, Result};

/// Default namespace prepended to shared-tier keys.
pub const DEFAULT_KEY_PREFIX: &str = "analysis:";

/// Configuration for the tiered cache.
///
/// ```rust
/// # use autopost_optimizer::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .memory_ttl(Duration::from_secs(3600))
///     .key_prefix("listing:");
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, `resolve` calls the computation directly. Default: true.
    pub enabled: bool,
    /// TTL of shared-tier entries. Default: 30 days.
    pub shared_ttl: Duration,
    /// Soft TTL of in-process entries. Default: 24 hours.
    pub memory_ttl: Duration,
    /// Capacity of the in-process tier. Default: 10,000.
    pub memory_max_entries: u64,
    /// Prefix for shared-tier keys. Default: `"analysis:"`.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shared_ttl: DEFAULT_SHARED_TTL,
            memory_ttl: DEFAULT_MEMORY_TTL,
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn shared_ttl(mut self, ttl: Duration) -> Self {
        self.shared_ttl = ttl;
        self
    }

    pub fn memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn memory_max_entries(mut self, n: u64) -> Self {
        self.memory_max_entries = n;
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Reject settings that would make the in-process tier outlive the
    /// shared tier or hold nothing at all.
    pub fn validate(&self) -> Result<()> {
        if self.memory_max_entries == 0 {
            return Err(OptimizerError::Configuration(
                "memory_max_entries must be greater than 0".to_string(),
            ));
        }
        if self.memory_ttl > self.shared_ttl {
            return Err(OptimizerError::Configuration(format!(
                "memory TTL ({:?}) must not exceed shared TTL ({:?})",
                self.memory_ttl, self.shared_ttl
            )));
        }
        Ok(())
    }
}

/// Multi-tier cache in front of an expensive analysis call.
pub struct CostOptimizer {
    memory: MemoryTier,
    shared: Option<Arc<dyn SharedTier>>,
    tracker: Arc<CostTracker>,
    config: CacheConfig,
}

impl CostOptimizer {
    /// Create a new builder.
    pub fn builder() -> CostOptimizerBuilder {
        CostOptimizerBuilder::new()
    }

    /// Return the analysis for `buffers`, computing it only on a full miss.
    ///
    /// `compute` runs at most once. Its error is returned unmodified and is
    /// never cached. Every call with caching enabled records exactly one hit
    /// or one miss.
    pub async fn resolve<B, F, Fut, E>(
        &self,
        buffers: Vec<B>,
        compute: F,
    ) -> std::result::Result<String, E>
    where
        B: AsRef<[u8]>,
        F: FnOnce(Vec<B>) -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
    {
        if !self.config.enabled {
            return compute(buffers).await;
        }

        let started = Instant::now();
        let fingerprint = derive_fingerprint(&buffers);
        debug!(
            fingerprint = fingerprint.short(),
            images = buffers.len(),
            "checking cache"
        );

        if let Some(hit) = self.memory.get(fingerprint.as_str()) {
            self.tracker.record_hit();
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "memory").increment(1);
            info!(
                fingerprint = fingerprint.short(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "memory cache hit"
            );
            return Ok(hit);
        }

        if let Some(hit) = self.shared_get(&fingerprint).await {
            self.tracker.record_hit();
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "shared").increment(1);
            info!(
                fingerprint = fingerprint.short(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "shared cache hit"
            );
            self.memory.insert(fingerprint.as_str(), hit.as_str());
            return Ok(hit);
        }

        self.tracker.record_miss();
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        info!(
            fingerprint = fingerprint.short(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache miss, computing"
        );

        let compute_started = Instant::now();
        let result = compute(buffers).await?;
        let compute_elapsed = compute_started.elapsed();
        metrics::histogram!(telemetry::COMPUTE_DURATION_SECONDS)
            .record(compute_elapsed.as_secs_f64());
        debug!(
            fingerprint = fingerprint.short(),
            compute_ms = compute_elapsed.as_millis() as u64,
            "analysis computed"
        );

        self.write_through(&fingerprint, &result).await;
        Ok(result)
    }

    /// Key under which `fingerprint` is stored in the shared tier.
    pub fn shared_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}", self.config.key_prefix, fingerprint)
    }

    /// The in-process tier.
    pub fn memory_tier(&self) -> &MemoryTier {
        &self.memory
    }

    /// The shared tier, if one is configured.
    pub fn shared_tier(&self) -> Option<&Arc<dyn SharedTier>> {
        self.shared.as_ref()
    }

    /// The hit/miss counter.
    pub fn tracker(&self) -> &Arc<CostTracker> {
        &self.tracker
    }

    /// Current hit/miss statistics.
    pub fn stats(&self) -> OptimizationStats {
        self.tracker.stats()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn shared_get(&self, fingerprint: &Fingerprint) -> Option<String> {
        let shared = self.shared.as_ref()?;
        match shared.get(&self.shared_key(fingerprint)).await {
            Ok(value) => value,
            Err(e) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "tier" => "shared", "op" => "get")
                    .increment(1);
                warn!(
                    tier = shared.name(),
                    fingerprint = fingerprint.short(),
                    error = %e,
                    "shared tier read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Populate both tiers independently; failures are logged and dropped.
    async fn write_through(&self, fingerprint: &Fingerprint, value: &str) {
        let shared_write = async {
            let Some(shared) = self.shared.as_ref() else {
                return;
            };
            let key = self.shared_key(fingerprint);
            if let Err(e) = shared.set(&key, value, self.config.shared_ttl).await {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL, "tier" => "shared", "op" => "set")
                    .increment(1);
                warn!(
                    tier = shared.name(),
                    fingerprint = fingerprint.short(),
                    error = %e,
                    "shared tier write failed"
                );
            }
        };
        let memory_write = async {
            self.memory.insert(fingerprint.as_str(), value);
        };

        tokio::join!(shared_write, memory_write);
        debug!(fingerprint = fingerprint.short(), "cached result");
    }
}

/// Builder for [`CostOptimizer`].
pub struct CostOptimizerBuilder {
    config: CacheConfig,
    shared: Option<Arc<dyn SharedTier>>,
    tracker: Option<Arc<CostTracker>>,
}

impl CostOptimizerBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            shared: None,
            tracker: None,
        }
    }

    /// Set the cache configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `tier` as the shared tier. Without one, only the in-process tier
    /// is consulted.
    pub fn shared_tier(mut self, tier: Arc<dyn SharedTier>) -> Self {
        self.shared = Some(tier);
        self
    }

    /// Share an existing tracker instead of creating a fresh one.
    pub fn tracker(mut self, tracker: Arc<CostTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> Result<CostOptimizer> {
        self.config.validate()?;
        let memory = MemoryTier::with_limits(self.config.memory_max_entries, self.config.memory_ttl);
        Ok(CostOptimizer {
            memory,
            shared: self.shared,
            tracker: self.tracker.unwrap_or_default(),
            config: self.config,
        })
    }
}

impl Default for CostOptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
