//! The two synchronized resources.

use std::future::Future;

use tienda_core::{Cart, Wishlist};

use super::Resource;
use crate::api::StoreClient;
use crate::error::ClientError;
use crate::events::ChangeEvent;

/// The signed-in user's cart.
#[derive(Debug, Clone)]
pub struct CartResource {
    client: StoreClient,
}

impl CartResource {
    #[must_use]
    pub const fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &StoreClient {
        &self.client
    }
}

impl Resource for CartResource {
    type State = Cart;
    const EVENT: ChangeEvent = ChangeEvent::CartUpdated;
    const NAME: &'static str = "cart";

    fn fetch(&self) -> impl Future<Output = Result<Cart, ClientError>> + Send {
        self.client.fetch_cart()
    }
}

/// The signed-in user's wishlist.
#[derive(Debug, Clone)]
pub struct WishlistResource {
    client: StoreClient,
}

impl WishlistResource {
    #[must_use]
    pub const fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &StoreClient {
        &self.client
    }
}

impl Resource for WishlistResource {
    type State = Wishlist;
    const EVENT: ChangeEvent = ChangeEvent::WishlistUpdated;
    const NAME: &'static str = "wishlist";

    fn fetch(&self) -> impl Future<Output = Result<Wishlist, ClientError>> + Send {
        self.client.fetch_wishlist()
    }
}
