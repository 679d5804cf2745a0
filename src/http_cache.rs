//! HTTP response cache middleware and its layered optimizations.
//!
//! Four independent `TakoPlugin`s wrap the handler like an onion. The
//! router's middleware chain runs registration order on the way in and the
//! reverse on the way out, so the first-registered plugin is outermost (it
//! sees the response last) and the last-registered is innermost (it sees the
//! response first). That ordering is registered here as
//! [`CacheControlPlugin`] (outermost), [`GzipPlugin`], [`ETagPlugin`],
//! [`ResponseCachePlugin`] (innermost, wrapping the handler directly): the
//! response cache stores the raw uncompressed JSON first, the ETag is
//! computed against those same uncompressed bytes next, gzip compresses the
//! ETag-validated body after that, and `Cache-Control` tags whatever comes
//! out last of all.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use http::{HeaderValue, StatusCode, header};
use http_body_util::BodyExt;

use crate::cache::memory::etag_for;
use crate::cache::{CacheProvider, keys};
use crate::plugins::TakoPlugin;
use crate::router::Router;

/// Per-route TTL table. `is_prefix` entries match any path starting with
/// `pattern`; order matters because more specific exact matches are listed
/// before the broader `/api/facilities/` prefix they'd otherwise shadow.
const ROUTE_TTLS: &[(&str, u64, bool)] = &[
    ("/api/facilities/search", 300, false),
    ("/api/facilities/suggest", 180, false),
    ("/api/insurance-providers", 1800, false),
    ("/api/procedures", 1800, false),
    ("/api/geocode", 3600, false),
    ("/api/facilities/", 600, true),
];

fn route_ttl(path: &str) -> Option<Duration> {
    ROUTE_TTLS.iter().find_map(|(pattern, ttl, is_prefix)| {
        let matches = if *is_prefix { path.starts_with(pattern) } else { path == *pattern };
        matches.then(|| Duration::from_secs(*ttl))
    })
}

/// Buffers `body` fully into `Bytes`. Every response on the cached surface is
/// small JSON, so full buffering (rather than streaming) is the right
/// tradeoff — it's also required to compute the cache key's stored value and
/// the ETag.
async fn buffer_body(body: crate::body::TakoBody) -> bytes::Bytes {
    match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::warn!(%err, "failed to buffer response body for caching");
            bytes::Bytes::new()
        }
    }
}

/// The core GET response cache: exact hit/miss semantics from the component
/// design, keyed by `http:cache:{sha256(method:path?query)}`.
#[derive(Clone)]
pub struct ResponseCachePlugin {
    cache: std::sync::Arc<dyn CacheProvider>,
}

impl ResponseCachePlugin {
    pub fn new(cache: std::sync::Arc<dyn CacheProvider>) -> Self {
        Self { cache }
    }
}

impl TakoPlugin for ResponseCachePlugin {
    fn name(&self) -> &'static str {
        "response-cache"
    }

    fn setup(&self, router: &Router) -> Result<()> {
        let cache = self.cache.clone();
        router.middleware(move |req, next| {
            let cache = cache.clone();
            async move {
                if req.method() != &http::Method::GET {
                    return next.run(req).await;
                }
                let path = req.uri().path().to_string();
                let Some(ttl) = route_ttl(&path) else {
                    return next.run(req).await;
                };
                let raw_query = req.uri().query().unwrap_or("");
                let key = keys::http_cache(req.method().as_str(), &path, raw_query);

                if let Ok(Some(cached)) = cache.get(&key).await {
                    return hyper::Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, "application/json")
                        .header("X-Cache", "HIT")
                        .body(crate::body::TakoBody::new(http_body_util::Full::from(cached)))
                        .unwrap();
                }

                let response = next.run(req).await;
                let (mut parts, body) = response.into_parts();
                let bytes = buffer_body(body).await;

                if parts.status == StatusCode::OK && !bytes.is_empty() {
                    if let Err(err) = cache.set(&key, bytes.clone(), ttl).await {
                        tracing::warn!(%err, key, "failed to populate http response cache");
                    }
                }

                parts.headers.insert("X-Cache", HeaderValue::from_static("MISS"));
                hyper::Response::from_parts(parts, crate::body::TakoBody::new(http_body_util::Full::from(bytes)))
            }
        });
        Ok(())
    }
}

/// Tags every response with `Cache-Control` by path pattern, independent of
/// whether the response cache actually stored it.
#[derive(Clone)]
pub struct CacheControlPlugin;

impl TakoPlugin for CacheControlPlugin {
    fn name(&self) -> &'static str {
        "cache-control"
    }

    fn setup(&self, router: &Router) -> Result<()> {
        router.middleware(|req, next| async move {
            let path = req.uri().path().to_string();
            let response = next.run(req).await;
            let Some(ttl) = route_ttl(&path) else {
                return response;
            };
            let (mut parts, body) = response.into_parts();
            parts.headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_str(&format!("public, max-age={}", ttl.as_secs())).unwrap(),
            );
            hyper::Response::from_parts(parts, body)
        });
        Ok(())
    }
}

/// Conditional-GET support: computes an ETag for every `200` body and
/// answers `304 Not Modified` when `If-None-Match` already matches it.
#[derive(Clone)]
pub struct ETagPlugin;

impl TakoPlugin for ETagPlugin {
    fn name(&self) -> &'static str {
        "etag"
    }

    fn setup(&self, router: &Router) -> Result<()> {
        router.middleware(|req, next| async move {
            let if_none_match = req.headers().get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()).map(str::to_string);

            let response = next.run(req).await;
            if response.status() != StatusCode::OK {
                return response;
            }
            let (mut parts, body) = response.into_parts();
            let bytes = buffer_body(body).await;
            let etag = etag_for(&bytes);

            if if_none_match.as_deref() == Some(etag.as_str()) {
                return hyper::Response::builder()
                    .status(StatusCode::NOT_MODIFIED)
                    .header(header::ETAG, &etag)
                    .body(crate::body::TakoBody::empty())
                    .unwrap();
            }

            parts.headers.insert(header::ETAG, HeaderValue::from_str(&etag).unwrap());
            hyper::Response::from_parts(parts, crate::body::TakoBody::new(http_body_util::Full::from(bytes)))
        });
        Ok(())
    }
}

/// Bounded pool of reusable level-5 gzip encoders, checked out per response
/// and discarded (not returned) if the checkout would otherwise block —
/// compressing without a pooled encoder is strictly worse than not pooling,
/// never worse than failing the response.
struct EncoderPool {
    encoders: Mutex<Vec<GzEncoder<Vec<u8>>>>,
}

impl EncoderPool {
    fn new(capacity: usize) -> Self {
        Self { encoders: Mutex::new(Vec::with_capacity(capacity)) }
    }

    fn compress(&self, bytes: &[u8]) -> Vec<u8> {
        let mut encoder = self
            .encoders
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| GzEncoder::new(Vec::with_capacity(bytes.len()), Compression::new(5)));

        use std::io::Write;
        let _ = encoder.write_all(bytes);
        let compressed = encoder.finish().unwrap_or_default();

        let reset = GzEncoder::new(Vec::with_capacity(compressed.capacity()), Compression::new(5));
        self.encoders.lock().unwrap().push(reset);
        compressed
    }
}

/// Compresses `200` response bodies when the client advertises
/// `Accept-Encoding: gzip`, using a pooled, reset-between-uses encoder.
#[derive(Clone)]
pub struct GzipPlugin {
    pool: std::sync::Arc<EncoderPool>,
}

impl GzipPlugin {
    pub fn new() -> Self {
        Self { pool: std::sync::Arc::new(EncoderPool::new(8)) }
    }
}

impl Default for GzipPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TakoPlugin for GzipPlugin {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn setup(&self, router: &Router) -> Result<()> {
        let pool = self.pool.clone();
        router.middleware(move |req, next| {
            let pool = pool.clone();
            async move {
                let accepts_gzip = req
                    .headers()
                    .get(header::ACCEPT_ENCODING)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.contains("gzip"));

                let response = next.run(req).await;
                if !accepts_gzip || response.status() != StatusCode::OK {
                    return response;
                }

                let (mut parts, body) = response.into_parts();
                let bytes = buffer_body(body).await;
                if bytes.is_empty() {
                    return hyper::Response::from_parts(parts, crate::body::TakoBody::new(http_body_util::Full::from(bytes)));
                }

                let compressed = pool.compress(&bytes);
                parts.headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                hyper::Response::from_parts(parts, crate::body::TakoBody::new(http_body_util::Full::from(compressed)))
            }
        });
        Ok(())
    }
}

/// Registers the four layered plugins outermost-first: `Cache-Control`
/// tagging wraps everything, gzip wraps the ETag check, and the response
/// cache sits innermost, directly against the handler.
pub fn install(router: &mut Router, cache: std::sync::Arc<dyn CacheProvider>) {
    router.plugin(CacheControlPlugin);
    router.plugin(GzipPlugin::new());
    router.plugin(ETagPlugin);
    router.plugin(ResponseCachePlugin::new(cache));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_ttl_prefers_exact_matches_over_the_facilities_prefix() {
        assert_eq!(route_ttl("/api/facilities/search"), Some(Duration::from_secs(300)));
        assert_eq!(route_ttl("/api/facilities/suggest"), Some(Duration::from_secs(180)));
        assert_eq!(route_ttl("/api/facilities/f1"), Some(Duration::from_secs(600)));
        assert_eq!(route_ttl("/api/geocode"), Some(Duration::from_secs(3600)));
        assert_eq!(route_ttl("/unrelated"), None);
    }
}
