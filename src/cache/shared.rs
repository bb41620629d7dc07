//! Shared (durable) cache tier.
//!
//! The shared tier outlives the process and is usually shared by every
//! instance of the service. Implementations report a missing key as
//! `Ok(None)` and reserve `Err` for transport or server failures, which the
//! tiered cache logs and treats as a miss.
//!
//! Three backends are provided:
//!
//! - [`InMemorySharedTier`]: process-local stand-in with per-entry TTL, used
//!   when no external store is configured.
//! - [`UpstashSharedTier`]: Upstash's Redis REST API over HTTPS.
//! - `RedisSharedTier` (feature `redis`): a native Redis connection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;

use crate::{OptimizerError, Result};

/// Default TTL for entries written to the shared tier (30 days).
pub const DEFAULT_SHARED_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Durable key/value store backing the tiered cache.
#[async_trait]
pub trait SharedTier: Send + Sync {
    /// Backend name for logging and health reporting.
    fn name(&self) -> &str;

    /// Fetch a value. Absence is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value that stops being returned after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Check connectivity.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Clone)]
struct ExpiringValue {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct WriteTtl;

impl Expiry<String, ExpiringValue> for WriteTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &ExpiringValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &ExpiringValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local shared tier honouring per-write TTLs.
///
/// Loses its contents on restart like the in-process tier, but keeps the
/// shared-tier contract so the rest of the cache behaves identically with or
/// without an external store.
pub struct InMemorySharedTier {
    entries: Cache<String, ExpiringValue>,
}

impl InMemorySharedTier {
    pub fn new() -> Self {
        Self::with_max_entries(100_000)
    }

    pub fn with_max_entries(max: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max)
            .expire_after(WriteTtl)
            .build();
        Self { entries }
    }
}

impl Default for InMemorySharedTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedTier for InMemorySharedTier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(
                key.to_string(),
                ExpiringValue {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}

// ============================================================================
// Upstash REST backend
// ============================================================================

/// Response envelope of the Upstash REST API.
#[derive(Debug, Deserialize)]
struct UpstashReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Shared tier backed by the Upstash Redis REST API.
///
/// See <https://upstash.com/docs/redis/features/restapi>.
#[derive(Clone)]
pub struct UpstashSharedTier {
    base_url: String,
    token: String,
    http: Client,
}

impl UpstashSharedTier {
    /// Create a client for the given REST URL and bearer token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OptimizerError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Option<serde_json::Value>> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| OptimizerError::SharedTier(e.to_string()))?;

        let status = response.status();
        let reply: UpstashReply = response
            .json()
            .await
            .map_err(|e| OptimizerError::SharedTier(format!("invalid Upstash reply: {e}")))?;

        if let Some(message) = reply.error {
            return Err(OptimizerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            return Err(OptimizerError::Api {
                status: status.as_u16(),
                message: format!("Upstash error: {status}"),
            });
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl SharedTier for UpstashSharedTier {
    fn name(&self) -> &str {
        "upstash"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let url = format!("{}/get/{}", self.base_url, key);
        match self.send(self.http.get(&url)).await? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(OptimizerError::SharedTier(format!(
                "unexpected GET result: {other}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let url = format!("{}/set/{}", self.base_url, key);
        let request = self
            .http
            .post(&url)
            .query(&[("EX", ttl.as_secs().max(1))])
            .body(value.to_string());
        self.send(request).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        self.send(self.http.get(&url)).await?;
        Ok(())
    }
}

// ============================================================================
// Redis backend
// ============================================================================

#[cfg(feature = "redis")]
pub use self::redis_tier::RedisSharedTier;

#[cfg(feature = "redis")]
mod redis_tier {
    use std::time::Duration;

    use async_trait::async_trait;
    use redis::AsyncCommands;
    use redis::aio::ConnectionManager;

    use super::SharedTier;
    use crate::Result;

    /// Shared tier over a native Redis connection.
    ///
    /// The connection manager reconnects on its own; a command issued while
    /// disconnected fails and is treated as a miss by the tiered cache.
    #[derive(Clone)]
    pub struct RedisSharedTier {
        conn: ConnectionManager,
    }

    impl RedisSharedTier {
        /// Connect to `url` (e.g. `redis://127.0.0.1/`).
        pub async fn connect(url: &str) -> Result<Self> {
            let client = redis::Client::open(url)?;
            let conn = ConnectionManager::new(client).await?;
            Ok(Self { conn })
        }
    }

    #[async_trait]
    impl SharedTier for RedisSharedTier {
        fn name(&self) -> &str {
            "redis"
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            let mut conn = self.conn.clone();
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
            let mut conn = self.conn.clone();
            let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            let mut conn = self.conn.clone();
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        }
    }
}
