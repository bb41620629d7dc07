//! Deferred deletion of uploaded images.
//!
//! After a post is published its uploaded images are no longer needed.
//! [`CleanupScheduler::schedule_cleanup`] arranges one best-effort deletion
//! per image after a delay. Deletions run sequentially, each independent of
//! the others; failures are logged and counted, never retried.
//!
//! Scheduled jobs live only in this process: a restart before the delay
//! elapses loses them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::telemetry;
use crate::{OptimizerError, Result};

/// Default delay before a scheduled cleanup runs.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(60 * 60);

/// Default upper bound on how long an image may be kept.
pub const DEFAULT_MAX_STORAGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Something that can delete an uploaded resource by id.
#[async_trait]
pub trait CleanupTarget: Send + Sync {
    /// Delete one resource. Any error counts as a failed attempt.
    async fn delete(&self, resource_id: &str) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    public_id: &'a str,
}

/// Deletes resources through the service's HTTP delete endpoint.
///
/// Sends `POST {base_url}{delete_path}` with `{"publicId": "<id>"}`.
/// Any 2xx status is success.
#[derive(Clone)]
pub struct HttpCleanupTarget {
    endpoint: String,
    http: Client,
}

impl HttpCleanupTarget {
    pub fn new(base_url: &str, delete_path: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OptimizerError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), delete_path),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CleanupTarget for HttpCleanupTarget {
    async fn delete(&self, resource_id: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&DeleteRequest {
                public_id: resource_id,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(OptimizerError::Api {
            status: status.as_u16(),
            message: format!("cleanup endpoint returned {status}"),
        })
    }
}

/// Configuration for [`CleanupScheduler`].
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// When false, scheduling is a no-op. Default: true.
    pub enabled: bool,
    /// Delay used by [`CleanupScheduler::schedule_default`]. Default: 60 minutes.
    pub default_delay: Duration,
    /// Longest delay honoured; longer requests are shortened. Default: 1 day.
    pub max_storage: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_delay: DEFAULT_CLEANUP_DELAY,
            max_storage: DEFAULT_MAX_STORAGE,
        }
    }
}

impl CleanupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn max_storage(mut self, max: Duration) -> Self {
        self.max_storage = max;
        self
    }
}

/// Outcome of one cleanup job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

/// Schedules one-shot delayed deletions.
pub struct CleanupScheduler {
    target: Arc<dyn CleanupTarget>,
    config: CleanupConfig,
}

impl CleanupScheduler {
    pub fn new(target: Arc<dyn CleanupTarget>, config: CleanupConfig) -> Self {
        Self { target, config }
    }

    /// Build a scheduler that deletes through the configured HTTP endpoint.
    pub fn from_config(section: &crate::config::CleanupSection) -> Result<Self> {
        let target = HttpCleanupTarget::new(&section.base_url, &section.delete_path)?;
        Ok(Self::new(Arc::new(target), section.into()))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Delete every id in `resource_ids` once `delay` has elapsed.
    ///
    /// Returns `None` without doing anything when cleanup is disabled or
    /// there is nothing to delete. Otherwise the job runs on its own task;
    /// await the handle to observe the report or drop it to fire and forget.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn schedule_cleanup(
        &self,
        resource_ids: Vec<String>,
        delay: Duration,
    ) -> Option<JoinHandle<CleanupReport>> {
        if !self.config.enabled {
            debug!(count = resource_ids.len(), "cleanup disabled, not scheduling");
            return None;
        }
        if resource_ids.is_empty() {
            return None;
        }

        let delay = if delay > self.config.max_storage {
            debug!(
                requested_secs = delay.as_secs(),
                max_secs = self.config.max_storage.as_secs(),
                "cleanup delay capped at max storage time"
            );
            self.config.max_storage
        } else {
            delay
        };

        info!(
            count = resource_ids.len(),
            delay_minutes = delay.as_secs() / 60,
            "scheduling image cleanup"
        );

        let target = Arc::clone(&self.target);
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_cleanup(target.as_ref(), &resource_ids).await
        }))
    }

    /// [`schedule_cleanup`](Self::schedule_cleanup) with the configured default delay.
    pub fn schedule_default(&self, resource_ids: Vec<String>) -> Option<JoinHandle<CleanupReport>> {
        self.schedule_cleanup(resource_ids, self.config.default_delay)
    }
}

/// Attempt each deletion once, in order.
pub async fn run_cleanup(target: &dyn CleanupTarget, resource_ids: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for id in resource_ids {
        match target.delete(id).await {
            Ok(()) => {
                metrics::counter!(telemetry::CLEANUP_TOTAL, "status" => "ok").increment(1);
                info!(resource_id = %id, "auto-cleaned image");
                report.deleted += 1;
            }
            Err(e) => {
                metrics::counter!(telemetry::CLEANUP_TOTAL, "status" => "error").increment(1);
                warn!(resource_id = %id, error = %e, "failed to auto-clean image");
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let target = HttpCleanupTarget::new("http://localhost:3000/", "/api/upload/delete").unwrap();
        assert_eq!(target.endpoint(), "http://localhost:3000/api/upload/delete");
    }

    #[test]
    fn delete_request_uses_camel_case() {
        let body = serde_json::to_value(DeleteRequest { public_id: "abc" }).unwrap();
        assert_eq!(body, serde_json::json!({ "publicId": "abc" }));
    }

    #[test]
    fn config_defaults() {
        let config = CleanupConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_delay, Duration::from_secs(3600));
        assert_eq!(config.max_storage, Duration::from_secs(86_400));
    }
}
