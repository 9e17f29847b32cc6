//! Static asset handler with conditional caching.
//!
//! # Responsibilities
//! - Map request paths below a public prefix onto a [`FileStore`]
//! - Refuse directories (no listings)
//! - Attach ETag / Last-Modified / Cache-Control / Expires when a TTL is set
//! - Answer conditional requests with 304
//!
//! # Design Decisions
//! - Every open or metadata failure is a plain 404 so store layout never leaks
//! - Validators are recomputed per request; nothing is cached server-side
//! - Usable as a tower `Service`, so it mounts with `Router::route_service`

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    http::{HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use percent_encoding::percent_decode_str;
use tower::Service;

use crate::fs::{FileStore, MemoryStore, StoreFile};
use crate::http::cache::CacheValidator;
use crate::http::content::{close_then, serve_content};

/// Serves single files from a read-only store.
pub struct StaticFiles<S> {
    public_path: Arc<str>,
    store: Arc<S>,
    cache_ttl: Duration,
}

impl<S> Clone for StaticFiles<S> {
    fn clone(&self) -> Self {
        Self {
            public_path: Arc::clone(&self.public_path),
            store: Arc::clone(&self.store),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S: FileStore> StaticFiles<S> {
    /// `public_path` is the URL prefix stripped before lookup; trailing
    /// slashes are ignored. A zero `cache_ttl` disables caching headers.
    pub fn new(public_path: &str, store: S, cache_ttl: Duration) -> Self {
        Self {
            public_path: Arc::from(public_path.trim_end_matches('/')),
            store: Arc::new(store),
            cache_ttl,
        }
    }

    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Produce the response for one request.
    ///
    /// `path` is the URI path as received; it is percent-decoded before the
    /// lookup, and the store normalises `..` only after decoding.
    pub async fn serve(&self, method: &Method, path: &str, headers: &HeaderMap) -> Response {
        let decoded = match percent_decode_str(path).decode_utf8() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Static path is not UTF-8");
                return not_found();
            }
        };
        let relative = decoded.strip_prefix(&*self.public_path).unwrap_or(&*decoded);

        let mut file = match self.store.open(relative).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Static file not opened");
                return not_found();
            }
        };

        let info = match file.metadata().await {
            Ok(info) if !info.is_dir => info,
            Ok(_) => {
                tracing::debug!(path = %path, "Refusing directory listing");
                return close_then(file, not_found()).await;
            }
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Static file metadata unavailable");
                return close_then(file, not_found()).await;
            }
        };

        if self.cache_ttl.is_zero() {
            return serve_content(method, headers, file, &info, HeaderMap::new()).await;
        }

        let validator = CacheValidator::from_info(&info);
        let cache_headers = validator.headers(self.cache_ttl, Utc::now());

        if validator.is_fresh(headers) {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            response.headers_mut().extend(cache_headers);
            return close_then(file, response).await;
        }

        serve_content(method, headers, file, &info, cache_headers).await
    }
}

impl<S, B> Service<Request<B>> for StaticFiles<S>
where
    S: FileStore,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let this = self.clone();
        let (parts, _body) = request.into_parts();
        Box::pin(async move { Ok(this.serve(&parts.method, parts.uri.path(), &parts.headers).await) })
    }
}

/// Static handler over a directory-backed or any other store.
pub fn static_handler<S: FileStore>(public_path: &str, root: S, cache_ttl: Duration) -> StaticFiles<S> {
    StaticFiles::new(public_path, root, cache_ttl)
}

/// Static handler over assets bundled into the binary.
pub fn embedded_static_handler(public_path: &str, assets: MemoryStore, cache_ttl: Duration) -> StaticFiles<MemoryStore> {
    StaticFiles::new(public_path, assets, cache_ttl)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found").into_response()
}
