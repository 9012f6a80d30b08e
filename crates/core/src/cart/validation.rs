//! Pre-checkout revalidation of a cart against the live catalog.
//!
//! Cart lines hold snapshots taken when books were added. Before an order is
//! created the snapshots are compared against the catalog and every drift is
//! reported as a [`ValidationIssue`]. Issues are data for the checkout flow to
//! act on; the cart itself is never modified here.

use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Cart, CartItem};
use crate::types::{BookId, BookStatus, Price};

/// Largest price difference still treated as "unchanged" (one cent).
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// The catalog fields validation cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub status: BookStatus,
    pub stock: u32,
    pub price: Price,
}

/// Read access to the product catalog.
///
/// Passed explicitly to [`Cart::validate_items`] so validation never reaches
/// for a global catalog handle.
pub trait BookCatalog: Send + Sync {
    /// Error raised when the catalog cannot be read.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current state of a book, or `None` if it does not exist.
    fn get_book(
        &self,
        book_id: BookId,
    ) -> impl Future<Output = Result<Option<BookSnapshot>, Self::Error>> + Send;
}

/// A difference between a cart line and the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// The book no longer exists or is not for sale.
    Unavailable { book_id: BookId },
    /// Fewer copies are in stock than the line requests.
    InsufficientStock {
        book_id: BookId,
        available: u32,
        requested: u32,
    },
    /// The catalog price moved by more than [`PRICE_TOLERANCE`].
    PriceChanged {
        book_id: BookId,
        old_price: Price,
        new_price: Price,
    },
}

impl ValidationIssue {
    /// The book the issue refers to.
    #[must_use]
    pub const fn book_id(&self) -> BookId {
        match self {
            Self::Unavailable { book_id }
            | Self::InsufficientStock { book_id, .. }
            | Self::PriceChanged { book_id, .. } => *book_id,
        }
    }
}

/// Compare one line against its catalog entry.
///
/// An unavailable book yields only [`ValidationIssue::Unavailable`]; otherwise
/// stock and price are checked independently.
#[must_use]
pub fn check_item(item: &CartItem, book: Option<&BookSnapshot>) -> Vec<ValidationIssue> {
    let Some(book) = book.filter(|book| book.status.is_sellable()) else {
        return vec![ValidationIssue::Unavailable {
            book_id: item.book_id,
        }];
    };

    let mut issues = Vec::new();
    let requested = u32::from(item.quantity);
    if book.stock < requested {
        issues.push(ValidationIssue::InsufficientStock {
            book_id: item.book_id,
            available: book.stock,
            requested,
        });
    }
    if book.price.differs_from(item.price, PRICE_TOLERANCE) {
        issues.push(ValidationIssue::PriceChanged {
            book_id: item.book_id,
            old_price: item.price,
            new_price: book.price,
        });
    }
    issues
}

impl Cart {
    /// Check every line against `catalog`.
    ///
    /// An empty result means the cart can be converted to an order as is.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error if any lookup fails.
    pub async fn validate_items<C: BookCatalog>(
        &self,
        catalog: &C,
    ) -> Result<Vec<ValidationIssue>, C::Error> {
        let mut issues = Vec::new();
        for item in self.items() {
            let book = catalog.get_book(item.book_id).await?;
            issues.extend(check_item(item, book.as_ref()));
        }
        Ok(issues)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;

    use chrono::Utc;

    use super::*;
    use crate::cart::CartOwner;
    use crate::types::{Quantity, UserId};

    struct FixedCatalog(HashMap<BookId, BookSnapshot>);

    impl BookCatalog for FixedCatalog {
        type Error = Infallible;

        async fn get_book(&self, book_id: BookId) -> Result<Option<BookSnapshot>, Infallible> {
            Ok(self.0.get(&book_id).copied())
        }
    }

    fn price(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2)).unwrap()
    }

    fn snapshot(stock: u32, cents: i64) -> BookSnapshot {
        BookSnapshot {
            status: BookStatus::Active,
            stock,
            price: price(cents),
        }
    }

    fn cart_with(lines: &[(BookId, i64, i64)]) -> Cart {
        let now = Utc::now();
        let mut cart = Cart::new(CartOwner::User(UserId::generate()), now);
        for (book, qty, cents) in lines {
            cart.add_item(
                *book,
                Quantity::new(*qty).unwrap(),
                Some(price(*cents)),
                now,
            )
            .unwrap();
        }
        cart
    }

    #[test]
    fn test_price_tolerance_is_one_cent() {
        assert_eq!(PRICE_TOLERANCE, Decimal::new(1, 2));
    }

    #[tokio::test]
    async fn test_clean_cart_has_no_issues() {
        let book = BookId::generate();
        let cart = cart_with(&[(book, 2, 1000)]);
        let catalog = FixedCatalog(HashMap::from([(book, snapshot(5, 1000))]));

        assert!(cart.validate_items(&catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_both_numbers() {
        let book = BookId::generate();
        let cart = cart_with(&[(book, 5, 1000)]);
        let before = cart.clone();
        let catalog = FixedCatalog(HashMap::from([(book, snapshot(2, 1000))]));

        let issues = cart.validate_items(&catalog).await.unwrap();

        assert_eq!(
            issues,
            vec![ValidationIssue::InsufficientStock {
                book_id: book,
                available: 2,
                requested: 5,
            }]
        );
        assert_eq!(cart, before);
    }

    #[tokio::test]
    async fn test_missing_and_inactive_books_are_unavailable() {
        let missing = BookId::generate();
        let retired = BookId::generate();
        let cart = cart_with(&[(missing, 1, 500), (retired, 1, 500)]);
        let mut retired_snapshot = snapshot(10, 500);
        retired_snapshot.status = BookStatus::Discontinued;
        let catalog = FixedCatalog(HashMap::from([(retired, retired_snapshot)]));

        let issues = cart.validate_items(&catalog).await.unwrap();

        assert_eq!(
            issues,
            vec![
                ValidationIssue::Unavailable { book_id: missing },
                ValidationIssue::Unavailable { book_id: retired },
            ]
        );
    }

    #[tokio::test]
    async fn test_price_drift_within_tolerance_is_ignored() {
        let book = BookId::generate();
        let cart = cart_with(&[(book, 1, 1000)]);
        let catalog = FixedCatalog(HashMap::from([(book, snapshot(3, 1001))]));

        assert!(cart.validate_items(&catalog).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_change_and_stock_reported_together() {
        let book = BookId::generate();
        let cart = cart_with(&[(book, 4, 1000)]);
        let catalog = FixedCatalog(HashMap::from([(book, snapshot(1, 1200))]));

        let issues = cart.validate_items(&catalog).await.unwrap();

        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0], ValidationIssue::InsufficientStock { .. }));
        assert_eq!(
            issues[1],
            ValidationIssue::PriceChanged {
                book_id: book,
                old_price: price(1000),
                new_price: price(1200),
            }
        );
    }

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let book = BookId::generate();
        let json = serde_json::to_value(ValidationIssue::InsufficientStock {
            book_id: book,
            available: 2,
            requested: 5,
        })
        .unwrap();

        assert_eq!(json["kind"], "insufficient_stock");
        assert_eq!(json["available"], 2);
        assert_eq!(json["requested"], 5);
        assert_eq!(json["book_id"], book.to_string());
    }
}
