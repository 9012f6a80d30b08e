//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (cart store ping)
//!
//! # Cart API (identity via x-user-id / x-cart-session)
//! POST   /api/cart/session          - Issue a guest session token
//! GET    /api/cart                  - Resolve and return the cart
//! DELETE /api/cart                  - Clear items (?discard=true deletes the cart)
//! POST   /api/cart/items            - Add a book
//! PATCH  /api/cart/items/{book_id}  - Set quantity (<= 0 removes)
//! DELETE /api/cart/items/{book_id}  - Remove a book
//! POST   /api/cart/merge            - Merge a guest cart into the user's cart
//! PUT    /api/cart/guest-email      - Set or clear the guest checkout email
//! GET    /api/cart/count            - Total copies in the cart
//! GET    /api/cart/validate         - Revalidate against the catalog
//! GET    /api/cart/checkout         - Checkout preview
//! ```

pub mod cart;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(cart::show).delete(cart::clear))
        .route("/api/cart/session", post(cart::create_session))
        .route("/api/cart/items", post(cart::add_item))
        .route(
            "/api/cart/items/{book_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/api/cart/merge", post(cart::merge))
        .route("/api/cart/guest-email", put(cart::set_guest_email))
        .route("/api/cart/count", get(cart::count))
        .route("/api/cart/validate", get(cart::validate))
        .route("/api/cart/checkout", get(cart::checkout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(cart_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the cart store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.carts().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
