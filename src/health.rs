//! Health and cost report.
//!
//! Summarises shared-tier connectivity, cache effectiveness and cleanup
//! settings in one serialisable value, for a health endpoint or the CLI.

use serde::Serialize;
use tracing::warn;

use crate::cache::CostOptimizer;
use crate::cleanup::CleanupScheduler;
use crate::version::version_string;

/// Connectivity of the shared tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierStatus {
    Connected,
    Error,
    /// No shared tier configured; only the in-process tier is used.
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedTierHealth {
    pub backend: String,
    pub status: TierStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostOptimizationHealth {
    pub enabled: bool,
    /// e.g. `"92.5%"`
    pub cache_hit_rate: String,
    pub total_requests: u64,
    /// e.g. `"$1.23"`
    pub estimated_savings: String,
    /// `"optimal"` or `"needs_improvement"`.
    pub performance: &'static str,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupHealth {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `"healthy"` when ready, `"degraded"` otherwise.
    pub status: &'static str,
    pub version: String,
    pub shared_tier: SharedTierHealth,
    pub cost_optimization: CostOptimizationHealth,
    pub cleanup: CleanupHealth,
    /// Caching is on and backed by a reachable shared tier.
    pub ready: bool,
}

impl HealthReport {
    /// Ping the shared tier and snapshot the optimizer's counters.
    pub async fn collect(optimizer: &CostOptimizer, cleanup: Option<&CleanupScheduler>) -> Self {
        let shared_tier = match optimizer.shared_tier() {
            Some(tier) => {
                let status = match tier.ping().await {
                    Ok(()) => TierStatus::Connected,
                    Err(e) => {
                        warn!(tier = tier.name(), error = %e, "shared tier ping failed");
                        TierStatus::Error
                    }
                };
                SharedTierHealth {
                    backend: tier.name().to_string(),
                    status,
                }
            }
            None => SharedTierHealth {
                backend: "none".to_string(),
                status: TierStatus::None,
            },
        };

        let stats = optimizer.stats();
        let enabled = optimizer.config().enabled;
        let cost_optimization = CostOptimizationHealth {
            enabled,
            cache_hit_rate: format!("{}%", stats.hit_rate),
            total_requests: stats.metrics.total_requests,
            estimated_savings: format!("${:.2}", stats.metrics.estimated_cost_saved),
            performance: if stats.is_optimal {
                "optimal"
            } else {
                "needs_improvement"
            },
            recommendation: stats.recommendation,
        };

        let ready = enabled && shared_tier.status == TierStatus::Connected;

        Self {
            status: if ready { "healthy" } else { "degraded" },
            version: version_string(),
            shared_tier,
            cost_optimization,
            cleanup: CleanupHealth {
                enabled: cleanup.is_some_and(CleanupScheduler::is_enabled),
            },
            ready,
        }
    }
}
