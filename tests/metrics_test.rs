//! Tests for metrics emitted by the cache, batch processor and cleanup.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use autopost_optimizer::cleanup::run_cleanup;
use autopost_optimizer::telemetry;
use autopost_optimizer::{
    BatchConfig, BatchProcessor, CacheConfig, CleanupTarget, CostOptimizer, OptimizerError,
    Result, SharedTier,
};

// ============================================================================
// Mocks
// ============================================================================

struct UnreachableTier;

#[async_trait]
impl SharedTier for UnreachableTier {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(OptimizerError::SharedTier("timed out".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        Err(OptimizerError::SharedTier("timed out".into()))
    }
}

struct HalfBrokenTarget;

#[async_trait]
impl CleanupTarget for HalfBrokenTarget {
    async fn delete(&self, resource_id: &str) -> Result<()> {
        if resource_id == "broken" {
            return Err(OptimizerError::Http("connection reset".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Counter value for `name` carrying `label = value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer = CostOptimizer::builder().build().unwrap();
                for _ in 0..2 {
                    optimizer
                        .resolve(vec![b"img".to_vec()], |_| async {
                            Ok::<_, OptimizerError>("a".to_string())
                        })
                        .await
                        .unwrap();
                }
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_HITS_TOTAL, "tier", "memory"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::COMPUTE_DURATION_SECONDS),
        "expected a compute duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn shared_tier_failures_record_error_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer = CostOptimizer::builder()
                    .shared_tier(Arc::new(UnreachableTier))
                    .build()
                    .unwrap();
                optimizer
                    .resolve(vec![b"img".to_vec()], |_| async {
                        Ok::<_, OptimizerError>("a".to_string())
                    })
                    .await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_ERRORS_TOTAL, "op", "get"),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_ERRORS_TOTAL, "op", "set"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn disabled_cache_records_nothing() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let optimizer = CostOptimizer::builder()
                    .config(CacheConfig::new().enabled(false))
                    .build()
                    .unwrap();
                optimizer
                    .resolve(vec![b"img".to_vec()], |_| async {
                        Ok::<_, OptimizerError>("a".to_string())
                    })
                    .await
                    .unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 0);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cleanup_records_outcomes() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let report = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let ids = vec!["ok-1".to_string(), "broken".to_string(), "ok-2".to_string()];
                run_cleanup(&HalfBrokenTarget, &ids).await
            })
        })
    });
    assert_eq!(report.failed, 1);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CLEANUP_TOTAL, "status", "ok"),
        2
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CLEANUP_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let processor = BatchProcessor::new(
        |items: Vec<u32>| async move { Ok(items) },
        BatchConfig::default(),
    );
    assert_eq!(processor.add(3).await.unwrap(), 3);

    let optimizer = CostOptimizer::builder().build().unwrap();
    let _result = optimizer
        .resolve(vec![b"img".to_vec()], |_| async {
            Ok::<_, OptimizerError>("a".to_string())
        })
        .await
        .unwrap();
}
