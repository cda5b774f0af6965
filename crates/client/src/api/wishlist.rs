//! Wishlist endpoints.
//!
//! Membership is a set: adding a present product and removing an absent one
//! both succeed.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use tienda_core::{ProductId, Wishlist, WishlistEntry};

use super::{Auth, StoreClient, decode, segment};
use crate::error::ClientError;
use crate::events::ChangeEvent;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Membership {
    is_in_wishlist: bool,
}

impl StoreClient {
    /// Fetch the authoritative wishlist.
    ///
    /// # Errors
    ///
    /// Returns `SessionMissing` without a request when no token is stored,
    /// and `Unauthorized` (after clearing the session) on a 401.
    #[instrument(skip(self))]
    pub async fn fetch_wishlist(&self) -> Result<Wishlist, ClientError> {
        let body = self
            .execute(Method::GET, "api/wishlist/", None, Auth::Access)
            .await?;
        let entries: Vec<WishlistEntry> = decode(&body)?;
        Ok(Wishlist::from_entries(entries))
    }

    /// Save a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_wishlist(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let body = json!({ "product_id": product_id });
        self.execute(Method::POST, "api/wishlist/add", Some(body), Auth::Access)
            .await?;
        self.inner.events.publish(ChangeEvent::WishlistUpdated);
        Ok(())
    }

    /// Drop a product from the wishlist. A 404 counts as success.
    ///
    /// # Errors
    ///
    /// Any request error other than 404.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_wishlist(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let path = format!("api/wishlist/remove/{}", segment(product_id.as_str()));
        match self.execute(Method::DELETE, &path, None, Auth::Access).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("wishlist entry already absent");
            }
            Err(e) => return Err(e),
        }
        self.inner.events.publish(ChangeEvent::WishlistUpdated);
        Ok(())
    }

    /// Whether a product is on the wishlist.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn check_wishlist(&self, product_id: &ProductId) -> Result<bool, ClientError> {
        let path = format!("api/wishlist/check/{}", segment(product_id.as_str()));
        let body = self.execute(Method::GET, &path, None, Auth::Access).await?;
        let membership: Membership = decode(&body)?;
        Ok(membership.is_in_wishlist)
    }

    /// Flip membership and return the new state.
    ///
    /// `currently_in` is what the caller displays, typically from
    /// [`StoreClient::check_wishlist`].
    ///
    /// # Errors
    ///
    /// Any request error; membership is then unchanged.
    pub async fn toggle_wishlist(
        &self,
        product_id: &ProductId,
        currently_in: bool,
    ) -> Result<bool, ClientError> {
        if currently_in {
            self.remove_from_wishlist(product_id).await?;
        } else {
            self.add_to_wishlist(product_id).await?;
        }
        Ok(!currently_in)
    }
}
