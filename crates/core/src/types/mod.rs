//! Core types for Tienda.
//!
//! This module provides type-safe wrappers for the storefront domain.

pub mod account;
pub mod cart;
pub mod checkout;
pub mod id;
pub mod order;
pub mod price;
pub mod product;
pub mod status;
pub mod wishlist;

pub use account::{AccountError, Email, Password, Username};
pub use cart::{Cart, CartLine};
pub use checkout::{
    CheckoutError, CheckoutItem, CheckoutRequest, CheckoutSummary, Coupon, PaymentMethod,
    ShippingAddress, ShippingMethod,
};
pub use id::*;
pub use order::{Order, OrderItem};
pub use price::Price;
pub use product::ProductRef;
pub use status::OrderStatus;
pub use wishlist::{Wishlist, WishlistEntry};
