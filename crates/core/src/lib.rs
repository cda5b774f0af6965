//! Tienda Core - Shared domain types.
//!
//! This crate provides the types shared by every Tienda component:
//! - `client` - Session store, REST client, event bus and view bindings
//! - `cli` - Command-line front end driving the client
//! - `integration-tests` - End-to-end tests against a fake REST API
//!
//! # Architecture
//!
//! The core crate contains only types and pure computations - no I/O, no
//! HTTP clients, no async. Cart totals, coupon rules and checkout math live
//! here so they can be tested without a network.
//!
//! # Modules
//!
//! - [`types`] - Product ids, prices, product snapshots, carts, wishlists,
//!   account input validation, checkout math and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
