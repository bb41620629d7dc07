//! Caching subsystem.
//!
//! Two tiers sit in front of the expensive analysis call:
//!
//! - [`memory::MemoryTier`]: in-process moka cache with a 24 hour soft TTL.
//!   Fastest, lost on restart.
//!
//! - [`shared::SharedTier`]: durable store shared between instances
//!   (Redis or Upstash), entries live for 30 days.
//!
//! [`tiered::CostOptimizer`] combines them: lookups go memory → shared →
//! compute, shared hits are promoted into memory, and fresh results are
//! written to both tiers.

pub mod memory;
pub mod shared;
pub mod tiered;

use std::sync::Arc;

pub use memory::MemoryTier;
pub use shared::{InMemorySharedTier, SharedTier, UpstashSharedTier};
#[cfg(feature = "redis")]
pub use shared::RedisSharedTier;
pub use tiered::{CacheConfig, CostOptimizer, CostOptimizerBuilder};

use crate::config::{Config, SharedBackend, SharedSection};
use crate::stats::CostTracker;
use crate::{OptimizerError, Result};

/// Open the shared tier selected by `section`.
///
/// Returns `Ok(None)` for [`SharedBackend::None`].
pub async fn connect_shared_tier(section: &SharedSection) -> Result<Option<Arc<dyn SharedTier>>> {
    let url = || {
        section.url.clone().ok_or_else(|| {
            OptimizerError::Configuration(format!(
                "shared.url is required for the {} backend",
                section.backend.as_str()
            ))
        })
    };

    match section.backend {
        SharedBackend::None => Ok(None),
        SharedBackend::Memory => Ok(Some(Arc::new(InMemorySharedTier::new()))),
        SharedBackend::Upstash => {
            let token = section.token().ok_or_else(|| {
                OptimizerError::Configuration(format!(
                    "Upstash token missing; set shared.token or {}",
                    crate::config::UPSTASH_TOKEN_ENV
                ))
            })?;
            Ok(Some(Arc::new(UpstashSharedTier::new(url()?, token)?)))
        }
        #[cfg(feature = "redis")]
        SharedBackend::Redis => Ok(Some(Arc::new(RedisSharedTier::connect(&url()?).await?))),
        #[cfg(not(feature = "redis"))]
        SharedBackend::Redis => Err(OptimizerError::Configuration(
            "the redis backend requires the `redis` feature".to_string(),
        )),
    }
}

impl CostOptimizer {
    /// Build an optimizer, and connect its shared tier, from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let tracker = Arc::new(CostTracker::with_config((&config.cost_tracking).into()));
        let mut builder = CostOptimizer::builder()
            .config((&config.cache).into())
            .tracker(tracker);
        if let Some(shared) = connect_shared_tier(&config.shared).await? {
            builder = builder.shared_tier(shared);
        }
        builder.build()
    }
}
