//! The shopping cart aggregate.
//!
//! A [`Cart`] owns its line items and the totals derived from them. Every
//! mutation goes through a method on `Cart` that finishes with the same
//! recompute step, so `total_items`, `total_price` and `expires_at` can never
//! drift from `items`:
//!
//! - at most one line per book
//! - `total_items == sum(quantity)`
//! - `total_price == sum(price * quantity)`
//! - a non-empty cart expires [`CART_TTL_DAYS`] after its last mutation
//!
//! Persistence and cart lookup live in the storefront crate; this module is
//! pure and takes the current time as an argument.

mod error;
mod identity;
mod order;
mod validation;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{BookId, CartId, Email, Price, Quantity, UserId};

pub use error::CartError;
pub use identity::{CartIdentity, CartOwner};
pub use order::OrderItem;
pub use validation::{BookCatalog, BookSnapshot, PRICE_TOLERANCE, ValidationIssue};

/// Days of inactivity before a non-empty cart expires.
pub const CART_TTL_DAYS: i64 = 30;

/// One book in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The book this line refers to.
    pub book_id: BookId,
    /// Copies requested.
    pub quantity: Quantity,
    /// Unit price captured when the line was added (or last re-added).
    pub price: Price,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// `price * quantity` for this line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.times(self.quantity)
    }
}

/// Stored fields of a cart, used to rebuild a [`Cart`] from persistence.
///
/// Totals are deliberately absent: they are always recomputed from `items`.
#[derive(Debug, Clone)]
pub struct CartParts {
    pub id: CartId,
    pub owner: CartOwner,
    pub items: Vec<CartItem>,
    pub guest_email: Option<Email>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token maintained by the store.
    pub version: i64,
}

/// A shopping cart owned by a user or a guest session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    owner: CartOwner,
    items: Vec<CartItem>,
    total_items: u32,
    total_price: Decimal,
    guest_email: Option<Email>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl Cart {
    /// Create an empty cart for `owner`.
    #[must_use]
    pub fn new(owner: CartOwner, now: DateTime<Utc>) -> Self {
        Self {
            id: CartId::generate(),
            owner,
            items: Vec::new(),
            total_items: 0,
            total_price: Decimal::ZERO,
            guest_email: None,
            expires_at: now + Duration::days(CART_TTL_DAYS),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Rebuild a cart from stored fields.
    ///
    /// Duplicate lines are coalesced and totals recomputed; timestamps are
    /// kept as stored.
    #[must_use]
    pub fn restore(parts: CartParts) -> Self {
        let mut cart = Self {
            id: parts.id,
            owner: parts.owner,
            items: parts.items,
            total_items: 0,
            total_price: Decimal::ZERO,
            guest_email: parts.guest_email,
            expires_at: parts.expires_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        };
        cart.refresh_totals();
        cart
    }

    /// Decompose into stored fields.
    #[must_use]
    pub fn into_parts(self) -> CartParts {
        CartParts {
            id: self.id,
            owner: self.owner,
            items: self.items,
            guest_email: self.guest_email,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }

    #[must_use]
    pub const fn id(&self) -> CartId {
        self.id
    }

    #[must_use]
    pub const fn owner(&self) -> &CartOwner {
        &self.owner
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// The line for `book_id`, if present.
    #[must_use]
    pub fn item(&self, book_id: BookId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.book_id == book_id)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub const fn total_items(&self) -> u32 {
        self.total_items
    }

    /// Sum of `price * quantity` across all lines.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    #[must_use]
    pub const fn guest_email(&self) -> Option<&Email> {
        self.guest_email.as_ref()
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Version the cart was loaded at.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Whether the cart is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Transfer a guest cart to `user_id`.
    ///
    /// The guest session is dropped; the cart keeps its items and totals.
    pub fn claim(&mut self, user_id: UserId, now: DateTime<Utc>) {
        self.owner = CartOwner::User(user_id);
        self.updated_at = now;
    }

    /// Add `quantity` copies of a book.
    ///
    /// An existing line has its quantity increased and, when `price` is
    /// given, its price snapshot replaced. A new line requires a price and is
    /// stamped with `added_at = now`.
    ///
    /// # Errors
    ///
    /// - [`CartError::Quantity`] if the line would exceed [`Quantity::MAX`]
    /// - [`CartError::PriceRequired`] if the book is new and `price` is `None`
    pub fn add_item(
        &mut self,
        book_id: BookId,
        quantity: Quantity,
        price: Option<Price>,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if let Some(item) = self.items.iter_mut().find(|item| item.book_id == book_id) {
            item.quantity = item.quantity.checked_add(quantity)?;
            if let Some(price) = price {
                item.price = price;
            }
        } else {
            let price = price.ok_or(CartError::PriceRequired(book_id))?;
            self.items.push(CartItem {
                book_id,
                quantity,
                price,
                added_at: now,
            });
        }

        self.recompute(now);
        Ok(())
    }

    /// Set the quantity of an existing line.
    ///
    /// A quantity of zero or less removes the line.
    ///
    /// # Errors
    ///
    /// - [`CartError::ItemNotFound`] if the book has no line
    /// - [`CartError::Quantity`] if `quantity` is above [`Quantity::MAX`]
    pub fn update_item(
        &mut self,
        book_id: BookId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        let Some(position) = self.items.iter().position(|item| item.book_id == book_id) else {
            return Err(CartError::ItemNotFound(book_id));
        };

        if quantity <= 0 {
            self.items.remove(position);
        } else {
            let quantity = Quantity::new(quantity)?;
            if let Some(item) = self.items.get_mut(position) {
                item.quantity = quantity;
            }
        }

        self.recompute(now);
        Ok(())
    }

    /// Remove the line for `book_id`.
    ///
    /// Returns `false`, leaving the cart untouched, when there is no such line.
    pub fn remove_item(&mut self, book_id: BookId, now: DateTime<Utc>) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.book_id != book_id);
        if self.items.len() == before {
            return false;
        }

        self.recompute(now);
        true
    }

    /// Remove every line.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.recompute(now);
    }

    /// Fold `other`'s lines into this cart.
    ///
    /// Shared books have their quantities summed (capped at
    /// [`Quantity::MAX`]) and keep this cart's price. Books only in `other`
    /// are copied with their original price and `added_at`.
    pub fn merge(&mut self, other: &Self, now: DateTime<Utc>) {
        for incoming in &other.items {
            match self
                .items
                .iter_mut()
                .find(|item| item.book_id == incoming.book_id)
            {
                Some(item) => item.quantity = item.quantity.saturating_add(incoming.quantity),
                None => self.items.push(incoming.clone()),
            }
        }

        self.recompute(now);
    }

    /// Set or clear the email used to correlate a guest checkout.
    pub fn set_guest_email(&mut self, email: Option<Email>, now: DateTime<Utc>) {
        self.guest_email = email;
        self.recompute(now);
    }

    /// Map the lines to the format consumed by order creation.
    #[must_use]
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.items.iter().map(OrderItem::from).collect()
    }

    /// Finish a mutation: derived fields, expiry and `updated_at`.
    fn recompute(&mut self, now: DateTime<Utc>) {
        self.refresh_totals();
        if !self.items.is_empty() {
            self.expires_at = now + Duration::days(CART_TTL_DAYS);
        }
        self.updated_at = now;
    }

    /// Coalesce duplicate lines and recompute totals from scratch.
    fn refresh_totals(&mut self) {
        let mut unique: Vec<CartItem> = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            match unique.iter_mut().find(|kept| kept.book_id == item.book_id) {
                Some(kept) => kept.quantity = kept.quantity.saturating_add(item.quantity),
                None => unique.push(item),
            }
        }
        self.items = unique;

        self.total_items = self.items.iter().map(|item| u32::from(item.quantity)).sum();
        self.total_price = self.items.iter().map(CartItem::line_total).sum();
    }
}
