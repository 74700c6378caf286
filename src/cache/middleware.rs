//! Response cache middleware.
//!
//! Wraps cacheable routes. A GET answered with `200 OK` is stored for one
//! TTL window and replayed byte-for-byte until it expires or an operator
//! invalidates it. Writes elsewhere in the application never touch it.

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::accounts::AuthenticatedUser;

use super::{
    keys::{ResponseKey, ViewerKey},
    store::{CachedResponse, ResponseStore},
};

/// Shared cache state for middleware and admin handlers.
#[derive(Clone)]
pub struct CacheState {
    pub store: Arc<ResponseStore>,
}

impl CacheState {
    pub fn new(store: Arc<ResponseStore>) -> Self {
        Self { store }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.store.config().enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let viewer = ViewerKey::from_user_id(
        request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|user| user.id),
    );
    let key = ResponseKey::new(request.uri().path(), request.uri().query(), viewer);

    if let Some(cached) = cache.store.get(&key) {
        counter!("murmur_response_cache_hit_total").increment(1);
        debug!(cache_key = %key, outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!("murmur_response_cache_miss_total").increment(1);
    debug!(cache_key = %key, outcome = "miss", "rendering fresh response");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return response;
    }

    let max_body_bytes = cache.store.config().max_body_bytes;
    let (parts, body) = response.into_parts();
    // Only bodies of known size within the limit are buffered.
    match body.size_hint().exact() {
        Some(size) if size <= max_body_bytes as u64 => {}
        size => {
            debug!(cache_key = %key, size, "response body unsized or too large to cache");
            return Response::from_parts(parts, body);
        }
    }

    let bytes = match axum::body::to_bytes(body, max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cache_key = %key, error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();
    if let Some(evicted) = cache
        .store
        .insert(key.clone(), parts.status.as_u16(), headers, bytes.clone())
    {
        debug!(cache_key = %evicted, "evicted least recently used response");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
