//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart resolution, mutations, merge and pre-checkout validation

pub mod cart;

pub use cart::CartService;
