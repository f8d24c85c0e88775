//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Authentication is per-route, through the [`RequireAuth`] extractor.

pub mod auth;
pub mod request_id;

pub use auth::{CurrentUser, RequireAuth};
pub use request_id::request_id_middleware;
