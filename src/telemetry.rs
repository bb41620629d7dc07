//! Telemetry metric name constants.
//!
//! Centralised metric names for optimizer operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `autopost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tier`: cache tier, "memory" or "shared"
//! - `op`: tier operation, "get" or "set"
//! - `status`: outcome, "ok" or "error"

/// Total cache hits, by the tier that answered.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "autopost_cache_hits_total";

/// Total lookups that fell through every tier to the expensive computation.
pub const CACHE_MISSES_TOTAL: &str = "autopost_cache_misses_total";

/// Total tier reads or writes that failed and were swallowed.
///
/// Labels: `tier`, `op` ("get" | "set").
pub const CACHE_ERRORS_TOTAL: &str = "autopost_cache_errors_total";

/// Duration of the expensive computation run on a miss, in seconds.
pub const COMPUTE_DURATION_SECONDS: &str = "autopost_compute_duration_seconds";

/// Total slices dispatched to a batch handler.
///
/// Labels: `status` ("ok" | "error").
pub const BATCHES_TOTAL: &str = "autopost_batches_total";

/// Total deferred deletion attempts.
///
/// Labels: `status` ("ok" | "error").
pub const CLEANUP_TOTAL: &str = "autopost_cleanup_total";
