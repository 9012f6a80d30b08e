//! Per-line cart quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value falls outside `Quantity::MIN..=Quantity::MAX`.
    #[error("quantity must be between {min} and {max} (got {value})", min = Quantity::MIN, max = Quantity::MAX)]
    OutOfRange {
        /// The rejected value.
        value: i64,
    },
}

/// Number of copies of one book on a cart line.
///
/// ## Constraints
///
/// - At least [`Quantity::MIN`] (1); an empty line is removed instead
/// - At most [`Quantity::MAX`] (10) copies per line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quantity(u8);

impl Quantity {
    /// Smallest allowed quantity.
    pub const MIN: u8 = 1;
    /// Largest allowed quantity.
    pub const MAX: u8 = 10;
    /// A single copy.
    pub const ONE: Self = Self(1);

    /// Create a quantity from any integer.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::OutOfRange`] outside `1..=10`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(QuantityError::OutOfRange { value })
    }

    /// The quantity as a `u8`.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Add two quantities, failing if the sum exceeds [`Quantity::MAX`].
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::OutOfRange`] carrying the attempted sum.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.0) + i64::from(other.0))
    }

    /// Add two quantities, capping the sum at [`Quantity::MAX`].
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(Self::MAX))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u8 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        Self::from(quantity.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
