//! HTTP middleware and extractors for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! The caller's cart identity is read per handler by [`RequestIdentity`].

pub mod identity;
pub mod request_id;

pub use identity::{RequestIdentity, SESSION_HEADER, USER_HEADER, generate_session_token};
pub use request_id::request_id_middleware;
