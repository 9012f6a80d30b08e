//! Cart request payloads and JSON views.
//!
//! Requests are validated while deserializing: quantities, prices, emails and
//! session tokens all go through their `inkwell_core` newtypes, so a handler
//! never sees an out-of-range value.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use inkwell_core::{
    BookId, Cart, CartId, CartItem, Email, OrderItem, Price, Quantity, SessionToken, UserId,
    ValidationIssue,
};

/// Body of `POST /api/cart/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddItemRequest {
    pub book_id: BookId,
    /// Copies to add; defaults to one.
    #[serde(default)]
    pub quantity: Quantity,
    /// Price snapshot. Required for a book not yet in the cart.
    #[serde(default)]
    pub price: Option<Price>,
}

/// Body of `PATCH /api/cart/items/{book_id}`.
///
/// Zero or a negative quantity removes the line.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Body of `POST /api/cart/merge`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeCartRequest {
    /// The guest session whose cart is folded into the caller's cart.
    pub session_token: SessionToken,
}

/// Body of `PUT /api/cart/guest-email`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestEmailRequest {
    /// `null` clears the stored email.
    pub email: Option<Email>,
}

/// Query of `DELETE /api/cart`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ClearCartQuery {
    /// Delete the cart instead of emptying it.
    #[serde(default)]
    pub discard: bool,
}

/// JSON representation of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub id: CartId,
    pub user_id: Option<UserId>,
    pub session_id: Option<SessionToken>,
    pub items: Vec<CartItem>,
    pub total_items: u32,
    pub total_price: Decimal,
    pub guest_email: Option<Email>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id(),
            user_id: cart.owner().user_id(),
            session_id: cart.owner().session().cloned(),
            items: cart.items().to_vec(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
            guest_email: cart.guest_email().cloned(),
            expires_at: cart.expires_at(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        }
    }
}

/// Response of `GET /api/cart/count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCountView {
    pub total_items: u32,
}

/// Response of `POST /api/cart/session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestSessionView {
    pub session_token: SessionToken,
}

/// Everything the checkout flow needs to decide whether to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutPreview {
    pub cart_id: CartId,
    pub issues: Vec<ValidationIssue>,
    pub items: Vec<OrderItem>,
    pub total_items: u32,
    pub total_price: Decimal,
    /// `true` when the cart has items and no validation issues.
    pub ready: bool,
}

impl CheckoutPreview {
    /// Combine a cart with the issues found validating it.
    #[must_use]
    pub fn new(cart: &Cart, issues: Vec<ValidationIssue>) -> Self {
        Self {
            cart_id: cart.id(),
            ready: !cart.is_empty() && issues.is_empty(),
            issues,
            items: cart.to_order_items(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use inkwell_core::CartOwner;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_add_item_request_defaults_quantity() {
        let book_id = BookId::generate();
        let request: AddItemRequest =
            serde_json::from_value(json!({ "book_id": book_id, "price": "12.50" })).unwrap();
        assert_eq!(request.book_id, book_id);
        assert_eq!(request.quantity, Quantity::ONE);
        assert_eq!(
            request.price.map(|p| p.amount()),
            Some(Decimal::new(1250, 2))
        );
    }

    #[test]
    fn test_add_item_request_rejects_bad_values() {
        let book_id = BookId::generate();
        for body in [
            json!({ "book_id": book_id, "quantity": 0 }),
            json!({ "book_id": book_id, "quantity": 11 }),
            json!({ "book_id": book_id, "price": "-1.00" }),
            json!({ "book_id": "not-a-uuid" }),
            json!({ "book_id": book_id, "colour": "red" }),
        ] {
            assert!(
                serde_json::from_value::<AddItemRequest>(body.clone()).is_err(),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn test_guest_email_request_accepts_null() {
        let request: GuestEmailRequest = serde_json::from_value(json!({ "email": null })).unwrap();
        assert!(request.email.is_none());

        let request: GuestEmailRequest =
            serde_json::from_value(json!({ "email": "reader@example.com" })).unwrap();
        assert_eq!(
            request.email.as_ref().map(Email::as_str),
            Some("reader@example.com")
        );
    }

    #[test]
    fn test_cart_view_reports_owner() {
        let user = UserId::generate();
        let cart = Cart::new(CartOwner::User(user), Utc::now());
        let view = CartView::from(&cart);
        assert_eq!(view.user_id, Some(user));
        assert!(view.session_id.is_none());
        assert_eq!(view.total_items, 0);
    }

    #[test]
    fn test_checkout_preview_ready() {
        let now = Utc::now();
        let mut cart = Cart::new(CartOwner::User(UserId::generate()), now);
        assert!(!CheckoutPreview::new(&cart, Vec::new()).ready);

        let book_id = BookId::generate();
        let price = Price::new(Decimal::new(1000, 2)).unwrap();
        cart.add_item(book_id, Quantity::new(2).unwrap(), Some(price), now)
            .unwrap();

        let preview = CheckoutPreview::new(&cart, Vec::new());
        assert!(preview.ready);
        assert_eq!(preview.items.len(), 1);
        assert_eq!(preview.total_price, Decimal::new(2000, 2));

        let preview = CheckoutPreview::new(&cart, vec![ValidationIssue::Unavailable { book_id }]);
        assert!(!preview.ready);
    }
}
