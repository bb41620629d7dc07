//! autopost-optimizer - cost optimization engine for AI image analysis
//!
//! Cuts paid AI-analysis calls for the autopost service by answering
//! near-duplicate uploads from cache, and keeps image storage small by
//! deleting uploads once they have been posted.
//!
//! - [`fingerprint`] derives a content key from uploaded image bytes.
//! - [`CostOptimizer`] resolves a key through an in-process tier, a shared
//!   tier and finally the caller's analysis function.
//! - [`BatchProcessor`] groups individual requests into bulk calls.
//! - [`CleanupScheduler`] deletes uploaded images after a delay.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autopost_optimizer::{CostOptimizer, InMemorySharedTier};
//!
//! #[tokio::main]
//! async fn main() -> autopost_optimizer::Result<()> {
//!     let optimizer = CostOptimizer::builder()
//!         .shared_tier(Arc::new(InMemorySharedTier::new()))
//!         .build()?;
//!
//!     let photos = vec![std::fs::read("kitchen.jpg").unwrap()];
//!     let analysis = optimizer
//!         .resolve(photos, |images| async move {
//!             // call the vision model here
//!             Ok::<_, autopost_optimizer::OptimizerError>(format!("{} images", images.len()))
//!         })
//!         .await?;
//!
//!     println!("{analysis}");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod health;
pub mod stats;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use batch::{BatchConfig, BatchProcessor};
#[cfg(feature = "redis")]
pub use cache::RedisSharedTier;
pub use cache::{
    CacheConfig, CostOptimizer, CostOptimizerBuilder, InMemorySharedTier, MemoryTier, SharedTier,
    UpstashSharedTier,
};
pub use cleanup::{CleanupConfig, CleanupReport, CleanupScheduler, CleanupTarget, HttpCleanupTarget};
pub use config::Config;
pub use error::{OptimizerError, Result};
pub use fingerprint::{Fingerprint, derive_fingerprint};
pub use health::HealthReport;
pub use stats::{CostMetrics, CostTracker, OptimizationStats, TrackingConfig};
pub use version::{PKG_VERSION, version_string};
