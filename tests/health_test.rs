//! Tests for [`HealthReport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use autopost_optimizer::health::TierStatus;
use autopost_optimizer::{
    CacheConfig, CleanupConfig, CleanupScheduler, CostOptimizer, HealthReport,
    HttpCleanupTarget, InMemorySharedTier, OptimizerError, Result, SharedTier,
};

struct DownTier;

#[async_trait]
impl SharedTier for DownTier {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(OptimizerError::SharedTier("down".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        Err(OptimizerError::SharedTier("down".into()))
    }

    async fn ping(&self) -> Result<()> {
        Err(OptimizerError::SharedTier("down".into()))
    }
}

fn cleanup(enabled: bool) -> CleanupScheduler {
    let target = HttpCleanupTarget::new("http://localhost:3000", "/api/upload/delete").unwrap();
    CleanupScheduler::new(Arc::new(target), CleanupConfig::new().enabled(enabled))
}

#[tokio::test]
async fn connected_shared_tier_is_healthy() {
    let optimizer = CostOptimizer::builder()
        .shared_tier(Arc::new(InMemorySharedTier::new()))
        .build()
        .unwrap();

    let report = HealthReport::collect(&optimizer, Some(&cleanup(true))).await;

    assert_eq!(report.status, "healthy");
    assert!(report.ready);
    assert_eq!(report.shared_tier.backend, "memory");
    assert_eq!(report.shared_tier.status, TierStatus::Connected);
    assert!(report.cleanup.enabled);
    assert!(report.version.starts_with(autopost_optimizer::PKG_VERSION));
}

#[tokio::test]
async fn failing_ping_is_degraded() {
    let optimizer = CostOptimizer::builder()
        .shared_tier(Arc::new(DownTier))
        .build()
        .unwrap();

    let report = HealthReport::collect(&optimizer, None).await;

    assert_eq!(report.status, "degraded");
    assert!(!report.ready);
    assert_eq!(report.shared_tier.status, TierStatus::Error);
    assert!(!report.cleanup.enabled);
}

#[tokio::test]
async fn missing_shared_tier_is_degraded() {
    let optimizer = CostOptimizer::builder().build().unwrap();
    let report = HealthReport::collect(&optimizer, Some(&cleanup(false))).await;

    assert_eq!(report.shared_tier.status, TierStatus::None);
    assert_eq!(report.shared_tier.backend, "none");
    assert!(!report.ready);
    assert!(!report.cleanup.enabled);
}

#[tokio::test]
async fn disabled_cache_is_not_ready() {
    let optimizer = CostOptimizer::builder()
        .config(CacheConfig::new().enabled(false))
        .shared_tier(Arc::new(InMemorySharedTier::new()))
        .build()
        .unwrap();
    let report = HealthReport::collect(&optimizer, None).await;
    assert!(!report.cost_optimization.enabled);
    assert!(!report.ready);
}

#[tokio::test]
async fn cost_section_reflects_hit_rate() {
    let optimizer = CostOptimizer::builder()
        .shared_tier(Arc::new(InMemorySharedTier::new()))
        .build()
        .unwrap();

    for _ in 0..10 {
        optimizer
            .resolve(vec![b"listing".to_vec()], |_| async {
                Ok::<_, OptimizerError>("v".to_string())
            })
            .await
            .unwrap();
    }

    let report = HealthReport::collect(&optimizer, None).await;
    let cost = &report.cost_optimization;
    assert_eq!(cost.total_requests, 10);
    assert_eq!(cost.cache_hit_rate, "90%");
    assert_eq!(cost.estimated_savings, "$0.09");
    assert_eq!(cost.performance, "optimal");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["shared_tier"]["status"], "connected");
    assert_eq!(json["cost_optimization"]["performance"], "optimal");
}
