//! Page-level response cache.
//!
//! Rendered pages are keyed by path, query string and viewer and kept for a
//! fixed window. Operators clear them through the admin listener:
//!
//! ```toml
//! [cache]
//! enabled = true
//! home_ttl_seconds = 20
//! max_entries = 256
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{ResponseKey, ViewerKey};
pub use middleware::{CacheState, response_cache_layer};
pub use store::{CachedResponse, ResponseStore};
