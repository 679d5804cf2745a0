//! Read-path core for a healthcare facility discovery service.
//!
//! This crate composes a cache-aside repository, a publish/subscribe event
//! bus, a Server-Sent-Events fan-out hub, an HTTP response cache, and a
//! single-flight sync scheduler on top of a small macro-free HTTP router.
//! The router, extractors, and response machinery are intentionally generic
//! — the domain logic lives in [`domain`], [`cache`], [`events`], [`sse`],
//! [`scheduler`], [`warmer`], [`invalidation`], and [`http_cache`].
//!
//! # Key concepts
//! - [router::Router] manages routes, middleware and dispatch.
//! - [extractors] parse request data (path params, query, JSON).
//! - [responder::Responder] converts return values into HTTP responses.
//! - [middleware] composes cross-cutting concerns; [plugins] hosts the
//!   response-cache wrappers registered around the cached REST surface.
//! - [app] is the composition root: it wires [cache], [domain::repository],
//!   [events], [scheduler], and [metrics] into an [app::AppState].

/// HTTP request and response body handling utilities.
pub mod body;

/// Application composition root: wires cache, repository, bus, scheduler and
/// metrics into shared state and exposes the domain HTTP routes.
pub mod app;

/// Crate-wide error taxonomy.
pub mod error;

/// Request data extraction utilities for parsing query params, JSON, and path params.
pub mod extractors;

/// Request handler traits and implementations.
mod handler;

/// Middleware for processing requests and responses in a pipeline.
pub mod middleware;

/// Plugin system for extending router functionality with composable modules.
pub mod plugins;

/// Response generation utilities and traits.
pub mod responder;

/// Route definition and matching logic.
mod route;

/// Request routing and dispatch functionality.
pub mod router;

/// HTTP server implementation and configuration.
mod server;

/// Server-Sent Events (SSE) framing and the fan-out subscriber hub.
pub mod sse;

/// Application state management and dependency injection.
pub mod state;

/// Structured logging setup.
pub mod telemetry;

/// Core type definitions used throughout the router.
pub mod types;

/// Facility entities, facility events, and the cached repository decorator.
pub mod domain;

/// Cache-provider trait, in-memory implementation, and cache-key helpers.
pub mod cache;

/// Publish/subscribe event bus keyed by facility and by geographic region.
pub mod events;

/// Per-route response cache, `ETag` conditional responses, and gzip
/// compression, layered as independent router plugins.
pub mod http_cache;

/// Bridges the event bus to the cache: consumes mutation events and evicts
/// affected cache-key patterns.
pub mod invalidation;

/// Process-lifetime metrics handle.
pub mod metrics;

/// Single-flight interval scheduler for external sync jobs.
pub mod scheduler;

/// Periodic preload of hot cache keys.
pub mod warmer;

pub use bytes::Bytes;
pub use http::{Method, StatusCode, header};
pub use http_body_util::Full;

/// Starts the HTTP server with the given listener and router.
///
/// Takes ownership of a TCP listener and router, then serves incoming
/// connections until the process is terminated.
///
/// # Examples
///
/// ```rust,no_run
/// use facility_pulse::{serve, router::Router};
/// use tokio::net::TcpListener;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// let router = Router::new();
/// serve(listener, router).await;
/// # Ok(())
/// # }
/// ```
pub use server::serve;
