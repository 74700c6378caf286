//! Response cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 20;
const DEFAULT_MAX_ENTRIES: usize = 256;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store cached pages at all.
    pub enabled: bool,
    /// Lifetime of a stored page.
    pub ttl: Duration,
    /// LRU bound on stored pages.
    pub max_entries: NonZeroUsize,
    /// Larger bodies are passed through without being stored.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.home_ttl,
            max_entries: settings.max_entries,
            max_body_bytes: settings.max_body_bytes.get(),
        }
    }
}
