//! Plugin system for extending router functionality with composable modules.
//!
//! The `TakoPlugin` trait defines the interface all plugins must implement for
//! registration and setup. `http_cache` hosts the concrete plugins (response
//! cache, `Cache-Control` tagging, `ETag` conditional responses, gzip
//! compression) that implement this trait for the cached REST surface.
//!
//! Plugins can be applied at two levels:
//! - **Router-level**: Applied globally to all routes using `router.plugin()`
//! - **Route-level**: Applied to specific routes using `route.plugin()`
//!
//! # Examples
//!
//! ```rust
//! use facility_pulse::plugins::TakoPlugin;
//! use facility_pulse::router::Router;
//! use anyhow::Result;
//!
//! struct LoggingPlugin;
//!
//! impl TakoPlugin for LoggingPlugin {
//!     fn name(&self) -> &'static str {
//!         "logging"
//!     }
//!
//!     fn setup(&self, _router: &Router) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use anyhow::Result;

use crate::router::Router;

/// Trait for implementing router plugins.
///
/// Plugins extend the router by layering middleware around the dispatch
/// path. They can be applied at both router and route levels:
/// - **Router-level**: Use `router.plugin()` to apply globally
/// - **Route-level**: Use `route.plugin()` to apply to specific routes
pub trait TakoPlugin: Send + Sync + 'static {
  /// Returns the unique name identifier for this plugin.
  fn name(&self) -> &'static str;

  /// Configures and initializes the plugin with the given router.
  fn setup(&self, router: &Router) -> Result<()>;
}
