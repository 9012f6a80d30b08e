//! Type-safe unit price using decimal arithmetic.
//!
//! Prices are non-negative amounts in the store currency's standard unit
//! (dollars, not cents), with at most two decimal places and below
//! ten billion so they fit the `NUMERIC(12, 2)` price columns unchanged.
//! Cart lines capture a `Price` snapshot when a book is added; it is compared
//! against the live catalog price before checkout.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Quantity;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),

    /// The amount has more than two decimal places.
    #[error("price cannot have fractions of a cent (got {0})")]
    TooPrecise(Decimal),

    /// The amount exceeds [`Price::MAX`].
    #[error("price cannot exceed {max} (got {0})", max = Price::MAX.0)]
    TooLarge(Decimal),
}

/// A non-negative unit price in whole cents.
///
/// ## Examples
///
/// ```
/// use inkwell_core::{Price, Quantity};
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(1250, 2)).unwrap();
/// let qty = Quantity::new(2).unwrap();
/// assert_eq!(price.times(qty), Decimal::new(2500, 2));
///
/// assert!(Price::new(Decimal::new(-1, 0)).is_err());
/// assert!(Price::new(Decimal::new(10_005, 3)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest accepted price, `9_999_999_999.99`.
    ///
    /// Line totals and cart totals built from bounded prices and quantities
    /// stay far inside `Decimal`'s range, so arithmetic on them cannot
    /// overflow.
    pub const MAX: Self = Self(Decimal::from_parts(3_567_587_327, 232, 0, false, 2));

    /// Decimal places a price may carry.
    pub const SCALE: u32 = 2;

    /// Create a price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero,
    /// [`PriceError::TooPrecise`] if it has fractions of a cent, or
    /// [`PriceError::TooLarge`] if it exceeds [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if amount.normalize().scale() > Self::SCALE {
            return Err(PriceError::TooPrecise(amount));
        }
        if amount > Self::MAX.0 {
            return Err(PriceError::TooLarge(amount));
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Line total for `quantity` units at this price.
    #[must_use]
    pub fn times(self, quantity: Quantity) -> Decimal {
        self.0 * Decimal::from(quantity.get())
    }

    /// Whether `other` is further than `tolerance` away from this price.
    #[must_use]
    pub fn differs_from(self, other: Self, tolerance: Decimal) -> bool {
        (self.0 - other.0).abs() > tolerance
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
