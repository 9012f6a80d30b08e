//! Handoff format from a cart to order creation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CartItem;
use crate::types::{BookId, Price, Quantity};

/// One order line derived from a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub book_id: BookId,
    pub quantity: Quantity,
    pub price: Price,
    /// `price * quantity`.
    pub total_price: Decimal,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            book_id: item.book_id,
            quantity: item.quantity,
            price: item.price,
            total_price: item.line_total(),
        }
    }
}
