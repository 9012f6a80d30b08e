//! Inkwell Core - Shared types and the shopping cart aggregate.
//!
//! This crate provides the domain model used across all Inkwell components:
//! - `storefront` - Cart service and JSON API
//! - `cli` - Command-line tools for migrations, catalog seeding and cart purges
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure cart logic - no
//! database access, no HTTP. Persistence and the product catalog are reached
//! through traits implemented by the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, emails and tokens
//! - [`cart`] - The cart aggregate, its mutations and pre-checkout validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{
    BookCatalog, BookSnapshot, Cart, CartError, CartIdentity, CartItem, CartOwner, CartParts,
    OrderItem, ValidationIssue,
};
pub use types::*;
