//! Cart errors.

use thiserror::Error;

use crate::types::{BookId, QuantityError};

/// Errors raised by cart resolution and cart mutations.
///
/// Validation findings are not errors; see [`super::ValidationIssue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Neither a user ID nor a guest session token was supplied.
    #[error("a user id or guest session token is required")]
    InvalidIdentity,

    /// The targeted book has no line in the cart.
    #[error("book {0} is not in the cart")]
    ItemNotFound(BookId),

    /// A quantity (or the sum of two quantities) is out of range.
    #[error(transparent)]
    Quantity(#[from] QuantityError),

    /// A new line was added without a price snapshot.
    #[error("a price is required when adding book {0} to the cart")]
    PriceRequired(BookId),
}
