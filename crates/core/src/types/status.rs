//! Catalog status enums.

use serde::{Deserialize, Serialize};

/// Sale status of a book in the catalog.
///
/// Only [`BookStatus::Active`] books can be checked out; carts holding any
/// other status are flagged during pre-checkout validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "inkwell.book_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// Listed and purchasable.
    #[default]
    Active,
    /// Temporarily hidden from the storefront.
    Inactive,
    /// Permanently withdrawn from sale.
    Discontinued,
}

impl BookStatus {
    /// Whether books in this status may be sold.
    #[must_use]
    pub const fn is_sellable(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Discontinued => write!(f, "discontinued"),
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "discontinued" => Ok(Self::Discontinued),
            _ => Err(format!("invalid book status: {s}")),
        }
    }
}
