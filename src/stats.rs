//! Hit/miss accounting and cost-saving estimates.
//!
//! [`CostTracker`] is owned by whoever builds the optimizer and shared via
//! `Arc`; there is no process-wide singleton, so tests can run isolated
//! counters side by side.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

/// Estimated price of one AI analysis call, in dollars.
pub const DEFAULT_COST_PER_CALL: f64 = 0.01;

/// Default number of requests between two stats log lines.
pub const DEFAULT_LOG_INTERVAL: u64 = 1000;

/// Hit rate (percent) at or above which the cache is considered optimal.
pub const OPTIMAL_HIT_RATE: f64 = 90.0;

/// Target hit rate reported alongside the periodic stats log.
const TARGET_HIT_RATE: f64 = 95.0;

/// Raw counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostMetrics {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub ai_calls_saved: u64,
    pub estimated_cost_saved: f64,
}

impl CostMetrics {
    /// Percentage of requests answered from cache, 0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.total_requests as f64 * 100.0
    }
}

/// Counters plus values derived at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationStats {
    #[serde(flatten)]
    pub metrics: CostMetrics,
    /// Hit rate in percent, rounded to one decimal.
    pub hit_rate: f64,
    pub is_optimal: bool,
    pub recommendation: &'static str,
}

impl OptimizationStats {
    fn from_metrics(metrics: CostMetrics) -> Self {
        let hit_rate = metrics.hit_rate();
        let is_optimal = hit_rate >= OPTIMAL_HIT_RATE;
        let recommendation = if is_optimal {
            "Optimization performing well!"
        } else {
            "Consider extending cache TTL or improving hash generation"
        };
        Self {
            metrics,
            hit_rate: (hit_rate * 10.0).round() / 10.0,
            is_optimal,
            recommendation,
        }
    }
}

/// Settings for [`CostTracker`].
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Whether the periodic stats line is logged. Default: true.
    pub log_enabled: bool,
    /// Log every N-th request. Default: 1000.
    pub log_interval: u64,
    /// Dollars saved per cache hit. Default: 0.01.
    pub cost_per_call: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            log_enabled: true,
            log_interval: DEFAULT_LOG_INTERVAL,
            cost_per_call: DEFAULT_COST_PER_CALL,
        }
    }
}

impl TrackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = enabled;
        self
    }

    pub fn log_interval(mut self, n: u64) -> Self {
        self.log_interval = n;
        self
    }

    pub fn cost_per_call(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }
}

/// Thread-safe hit/miss counter.
#[derive(Debug, Default)]
pub struct CostTracker {
    metrics: Mutex<CostMetrics>,
    config: TrackingConfig,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrackingConfig) -> Self {
        Self {
            metrics: Mutex::new(CostMetrics::default()),
            config,
        }
    }

    /// Count a lookup answered from cache.
    pub fn record_hit(&self) {
        let snapshot = {
            let mut m = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
            m.total_requests += 1;
            m.cache_hits += 1;
            m.ai_calls_saved += 1;
            m.estimated_cost_saved += self.config.cost_per_call;
            *m
        };
        self.log_if_due(&snapshot);
    }

    /// Count a lookup that required the expensive computation.
    pub fn record_miss(&self) {
        let snapshot = {
            let mut m = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
            m.total_requests += 1;
            m.cache_misses += 1;
            *m
        };
        self.log_if_due(&snapshot);
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> CostMetrics {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counters plus hit rate, optimality and a recommendation.
    pub fn stats(&self) -> OptimizationStats {
        OptimizationStats::from_metrics(self.snapshot())
    }

    fn log_if_due(&self, m: &CostMetrics) {
        if !self.config.log_enabled || self.config.log_interval == 0 {
            return;
        }
        if m.total_requests % self.config.log_interval == 0 {
            info!(
                requests = m.total_requests,
                hit_rate = %format!("{:.1}%", m.hit_rate()),
                ai_calls_saved = m.ai_calls_saved,
                estimated_savings = %format!("${:.2}", m.estimated_cost_saved),
                target_hit_rate = %format!("{TARGET_HIT_RATE}%"),
                "cost optimization stats"
            );
        }
    }
}
