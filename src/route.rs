//! HTTP route definition and path matching functionality.
//!
//! This module provides the core `Route` struct for defining HTTP routes with path patterns,
//! parameter extraction, and middleware support. Routes can contain dynamic segments like
//! `{id}` that are captured as parameters, and support method-specific handlers with
//! optional trailing slash redirection and route-specific middleware chains.
//!
//! # Examples
//!
//! ```rust
//! use facility_pulse::route::Route;
//! use facility_pulse::handler::BoxHandler;
//! use facility_pulse::types::Request;
//! use http::Method;
//!
//! async fn handler(_req: Request) -> &'static str {
//!     "Hello, World!"
//! }
//!
//! let route = Route::new(
//!     "/users/{id}".to_string(),
//!     Method::GET,
//!     BoxHandler::new(handler),
//!     None
//! );
//!
//! let params = route.match_path("/users/123").unwrap();
//! assert_eq!(params.get("id"), Some(&"123".to_string()));
//! ```

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock},
};

use http::Method;

use crate::{
    handler::BoxHandler,
    middleware::Next,
    responder::Responder,
    types::{BoxMiddleware, Request},
};

/// HTTP route with path pattern matching and middleware support.
pub struct Route {
    /// Original path string used to create this route.
    pub path: String,
    /// HTTP method this route responds to.
    pub method: Method,
    /// Handler function to execute when route is matched.
    pub handler: BoxHandler,
    /// Route-specific middleware chain.
    pub middlewares: RwLock<VecDeque<BoxMiddleware>>,
    /// Whether trailing slash redirection is enabled.
    pub tsr: bool,
}

impl Route {
    /// Creates a new route with the specified path, method, and handler.
    pub fn new(path: String, method: Method, handler: BoxHandler, tsr: Option<bool>) -> Self {
        Self {
            path,
            method,
            handler,
            middlewares: RwLock::new(VecDeque::new()),
            tsr: tsr.unwrap_or(false),
        }
    }

    /// Adds middleware to this route's execution chain.
    pub fn middleware<F, Fut, R>(&self, f: F) -> &Self
    where
        F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = R> + Send + 'static,
        R: Responder + Send + 'static,
    {
        let mw: BoxMiddleware = Arc::new(move |req, next| {
            let fut = f(req, next); // Fut<'a>

            Box::pin(async move { fut.await.into_response() })
        });

        self.middlewares.write().unwrap().push_back(mw);
        self
    }

    /// Matches `path` against this route's pattern, binding `{name}` segments.
    ///
    /// Segment counts must match exactly; a literal segment must match
    /// byte-for-byte. Returns `Some(params)` (empty if the pattern has no
    /// dynamic segments) on a match, `None` otherwise.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let pattern: Vec<&str> = self.path.split('/').filter(|s| !s.is_empty()).collect();
        let actual: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (p, a) in pattern.iter().zip(actual.iter()) {
            match p.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
                Some(name) => {
                    params.insert(name.to_string(), a.to_string());
                }
                None if p == a => {}
                None => return None,
            }
        }
        Some(params)
    }

    /// True if every segment of this route's pattern is a literal (no `{param}`).
    pub fn is_static(&self) -> bool {
        !self.path.contains('{')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> Route {
        Route::new(path.to_string(), Method::GET, BoxHandler::new(|| async { "ok" }), None)
    }

    #[test]
    fn binds_dynamic_segments() {
        let r = route("/users/{id}");
        let params = r.match_path("/users/42").unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn rejects_mismatched_segment_count() {
        let r = route("/users/{id}");
        assert!(r.match_path("/users/42/profile").is_none());
    }

    #[test]
    fn rejects_literal_mismatch() {
        let r = route("/api/facilities/search");
        assert!(r.match_path("/api/facilities/f1").is_none());
    }

    #[test]
    fn static_route_is_not_dynamic() {
        assert!(route("/api/facilities/search").is_static());
        assert!(!route("/api/facilities/{id}").is_static());
    }
}
