//! Cart API handlers.
//!
//! Every handler identifies the caller through [`RequestIdentity`] and
//! returns JSON. Request bodies are typed and validated on extraction;
//! malformed input is answered with `400` and an `{"error": ...}` body.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use inkwell_core::{BookId, ValidationIssue};

use crate::error::{AppError, Result};
use crate::middleware::{RequestIdentity, generate_session_token};
use crate::models::{
    AddItemRequest, CartView, CheckoutPreview, ClearCartQuery, GuestEmailRequest,
    GuestSessionView, ItemCountView, MergeCartRequest, UpdateItemRequest,
};
use crate::state::AppState;

/// Issue a fresh guest session token.
///
/// No cart is created until the token is first used.
#[instrument]
pub async fn create_session() -> Result<(StatusCode, Json<GuestSessionView>)> {
    let session_token = generate_session_token()
        .map_err(|e| AppError::Internal(format!("failed to generate session token: {e}")))?;
    Ok((StatusCode::CREATED, Json(GuestSessionView { session_token })))
}

/// Resolve and return the caller's cart.
#[instrument(skip(state, identity))]
pub async fn show(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<CartView>> {
    let cart = state.carts().resolve(&identity).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Empty the cart, or delete it with `?discard=true`.
#[instrument(skip(state, identity, query))]
pub async fn clear(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    query: std::result::Result<Query<ClearCartQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;

    if query.discard {
        state.carts().discard(&identity).await?;
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let cart = state.carts().clear(&identity).await?;
    Ok(Json(CartView::from(&cart)).into_response())
}

/// Add copies of a book.
#[instrument(skip(state, identity, payload))]
pub async fn add_item(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    payload: std::result::Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let cart = state.carts().add_item(&identity, request).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Set the quantity of a line.
#[instrument(skip(state, identity, book_id, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    book_id: std::result::Result<Path<BookId>, PathRejection>,
    payload: std::result::Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Path(book_id) = book_id?;
    let Json(request) = payload?;
    let cart = state
        .carts()
        .update_item(&identity, book_id, request)
        .await?;
    Ok(Json(CartView::from(&cart)))
}

/// Remove a line.
#[instrument(skip(state, identity, book_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    book_id: std::result::Result<Path<BookId>, PathRejection>,
) -> Result<Json<CartView>> {
    let Path(book_id) = book_id?;
    let cart = state.carts().remove_item(&identity, book_id).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Merge a guest cart into the signed-in user's cart.
#[instrument(skip(state, identity, payload))]
pub async fn merge(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    payload: std::result::Result<Json<MergeCartRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let cart = state.carts().merge_guest(&identity, request).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Set or clear the guest checkout email.
#[instrument(skip(state, identity, payload))]
pub async fn set_guest_email(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    payload: std::result::Result<Json<GuestEmailRequest>, JsonRejection>,
) -> Result<Json<CartView>> {
    let Json(request) = payload?;
    let cart = state.carts().set_guest_email(&identity, request).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Cart count badge.
#[instrument(skip(state, identity))]
pub async fn count(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<ItemCountView>> {
    let total_items = state.carts().count(&identity).await?;
    Ok(Json(ItemCountView { total_items }))
}

/// Revalidate the cart against the catalog.
#[instrument(skip(state, identity))]
pub async fn validate(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<Vec<ValidationIssue>>> {
    let issues = state.carts().validate(&identity).await?;
    Ok(Json(issues))
}

/// Validation issues and order lines for the checkout flow.
#[instrument(skip(state, identity))]
pub async fn checkout(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<CheckoutPreview>> {
    let preview = state.carts().checkout_preview(&identity).await?;
    Ok(Json(preview))
}
