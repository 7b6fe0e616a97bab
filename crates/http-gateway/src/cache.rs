//! URI-keyed response cache.
//!
//! List endpoints get hammered by dashboards polling on short intervals;
//! a small TTL cache in front of the proxied routes absorbs most of that
//! without the backend seeing it. Entries are keyed by the full request
//! URI and only successful plain GETs are stored; upgrade requests must
//! always reach the relay.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;
use dashmap::DashMap;
use http::{header, HeaderMap, Method, StatusCode};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::server::AppState;

pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    health_ttl: Duration,
    api_ttl: Duration,
}

struct CacheEntry {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }

    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

impl ResponseCache {
    pub fn new(health_ttl: Duration, api_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            health_ttl,
            api_ttl,
        }
    }

    /// The health route has its own TTL; everything else counts as API.
    fn ttl_for(&self, path: &str) -> Duration {
        if path == "/health" {
            self.health_ttl
        } else {
            self.api_ttl
        }
    }

    fn get(&self, key: &str) -> Option<Response> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.to_response())
    }

    fn put(&self, key: String, status: StatusCode, headers: HeaderMap, body: Bytes, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                status,
                headers,
                body,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }
}

/// Axum middleware wrapping the routes transparently: the handlers beneath
/// stay plain request handlers and never see the cache.
pub async fn layer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET || request.headers().contains_key(header::UPGRADE) {
        return next.run(request).await;
    }

    let key = request.uri().to_string();
    let ttl = state.cache.ttl_for(request.uri().path());

    if let Some(hit) = state.cache.get(&key) {
        debug!(uri = %key, "serving response from cache");
        return hit;
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            state
                .cache
                .put(key, parts.status, parts.headers.clone(), bytes.clone(), ttl);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            warn!(uri = %key, %err, "failed to buffer response for caching");
            Response::from_parts(parts, Body::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResponseCache {
        ResponseCache::new(Duration::from_secs(30), Duration::from_secs(15))
    }

    fn store(cache: &ResponseCache, key: &str, body: &'static [u8], ttl: Duration) {
        cache.put(
            key.to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(body),
            ttl,
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hit_before_expiry_miss_after() {
        let cache = cache();
        store(&cache, "/apis/v1/pods", b"{}", Duration::from_secs(15));

        assert!(cache.get("/apis/v1/pods").is_some());

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(cache.get("/apis/v1/pods").is_none());
        // The expired entry is evicted, not just skipped.
        assert!(cache.entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_distinct_uris() {
        let cache = cache();
        store(&cache, "/apis/v1/pods?status=run", b"{}", Duration::from_secs(15));

        assert!(cache.get("/apis/v1/pods?status=run").is_some());
        assert!(cache.get("/apis/v1/pods").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cached_response_replays_status_and_body() {
        let cache = cache();
        cache.put(
            "/health".to_string(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"OK"),
            Duration::from_secs(30),
        );

        let response = cache.get("/health").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[test]
    fn route_ttls_are_independent() {
        let cache = cache();
        assert_eq!(cache.ttl_for("/health"), Duration::from_secs(30));
        assert_eq!(cache.ttl_for("/apis/v1/pods"), Duration::from_secs(15));
    }
}
