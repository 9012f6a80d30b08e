//! Request and response models for the cart API.

pub mod cart;

pub use cart::{
    AddItemRequest, CartView, CheckoutPreview, ClearCartQuery, GuestEmailRequest,
    GuestSessionView, ItemCountView, MergeCartRequest, UpdateItemRequest,
};
