//! Tienda client library.
//!
//! Keeps cart and wishlist views synchronized with the Tienda REST API.
//!
//! # Architecture
//!
//! - [`session`] - Persisted bearer token; the only writer of session state
//! - [`api`] - `reqwest` client for cart, wishlist, catalog, auth and orders
//! - [`events`] - In-process publish/subscribe of payload-less change events
//! - [`binding`] - Mount/subscribe/re-fetch/unmount lifecycle, written once
//!   and parameterized by resource
//!
//! A mutating call succeeds, the client publishes a [`ChangeEvent`], and
//! every mounted binding subscribed to it re-fetches the authoritative state.
//! The session store is consulted before every fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tienda_client::{ClientConfig, EventBus, FileSessionStore, StoreClient, ViewBinding};
//!
//! let config = ClientConfig::from_env()?;
//! let session = Arc::new(FileSessionStore::open(&config.session_file)?);
//! let client = StoreClient::new(&config, session, EventBus::new())?;
//!
//! let cart = ViewBinding::cart(&client);
//! cart.mount();
//! client.add_to_cart(&product_id, 1).await?; // cart view re-fetches
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod binding;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod token;

pub use api::{QuantityChange, StoreClient};
pub use binding::{CartResource, Phase, Resource, ViewBinding, ViewState, WishlistResource};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Notice, NoticeLevel};
pub use events::{ChangeEvent, EventBus, Subscription};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionError, SessionStore, SessionUser};
