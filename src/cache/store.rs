//! Time-bounded storage for rendered responses.

use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::keys::ResponseKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

/// Rendered response captured on first render and replayed verbatim.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub expires_at: Instant,
}

impl CachedResponse {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct ResponseStore {
    config: CacheConfig,
    responses: Mutex<LruCache<ResponseKey, CachedResponse>>,
}

impl ResponseStore {
    pub fn new(config: CacheConfig) -> Self {
        let responses = Mutex::new(LruCache::new(config.max_entries));
        Self { config, responses }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fresh entry for `key`, dropping it if its window has closed.
    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut responses = mutex_lock(&self.responses, SOURCE, "get");
        match responses.get(key) {
            Some(cached) if cached.is_fresh(now) => Some(cached.clone()),
            Some(_) => {
                responses.pop(key);
                None
            }
            None => None,
        }
    }

    /// Store a response for one TTL window. Returns the key evicted to make room, if any.
    pub fn insert(
        &self,
        key: ResponseKey,
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Option<ResponseKey> {
        let cached = CachedResponse {
            status,
            headers,
            body,
            expires_at: Instant::now() + self.config.ttl,
        };
        let probe = key.clone();
        mutex_lock(&self.responses, SOURCE, "insert")
            .push(key, cached)
            .and_then(|(evicted, _)| (evicted != probe).then_some(evicted))
    }

    pub fn invalidate(&self, key: &ResponseKey) -> bool {
        mutex_lock(&self.responses, SOURCE, "invalidate")
            .pop(key)
            .is_some()
    }

    /// Drop every entry for `path`, whatever its query or viewer.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let mut responses = mutex_lock(&self.responses, SOURCE, "invalidate_path");
        let matching: Vec<ResponseKey> = responses
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            responses.pop(key);
        }
        matching.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut responses = mutex_lock(&self.responses, SOURCE, "invalidate_all");
        let removed = responses.len();
        responses.clear();
        removed
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
