//! In-process cache tier.
//!
//! The fastest tier, lost on restart. Entries expire after a soft TTL
//! (default 24 hours) that is shorter than the shared tier's, so this tier
//! only ever accelerates reads the shared tier could also answer.

use std::time::Duration;

use moka::sync::Cache;

/// Default soft TTL of the in-process tier.
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default maximum number of entries in the in-process tier.
pub const DEFAULT_MEMORY_MAX_ENTRIES: u64 = 10_000;

/// Bounded in-process store of analysis results keyed by fingerprint.
///
/// Thread-safe (moka handles concurrent access internally).
pub struct MemoryTier {
    entries: Cache<String, String>,
}

impl MemoryTier {
    /// Create a tier with the default TTL and capacity.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MEMORY_MAX_ENTRIES, DEFAULT_MEMORY_TTL)
    }

    /// Create a tier with a custom capacity and soft TTL.
    pub fn with_limits(max_entries: u64, ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    /// Look up a cached result. Returns `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key)
    }

    /// Insert (or overwrite) a cached result.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries currently in the tier.
    ///
    /// moka updates this lazily, so it may briefly lag recent writes.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let tier = MemoryTier::new();
        tier.insert("abc", "living room, two windows");
        assert_eq!(tier.get("abc").as_deref(), Some("living room, two windows"));
    }

    #[test]
    fn miss_returns_none() {
        let tier = MemoryTier::new();
        assert!(tier.get("nonexistent").is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let tier = MemoryTier::new();
        tier.insert("k", "first");
        tier.insert("k", "second");
        assert_eq!(tier.get("k").as_deref(), Some("second"));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let tier = MemoryTier::with_limits(10, Duration::from_millis(250));
        tier.insert("k", "v");
        assert!(tier.get("k").is_some());
        std::thread::sleep(Duration::from_millis(750));
        assert!(tier.get("k").is_none());
    }

    #[test]
    fn clear_drops_entries() {
        let tier = MemoryTier::new();
        tier.insert("a", "1");
        tier.clear();
        assert!(tier.get("a").is_none());
    }
}
