//! Cart endpoints.

use reqwest::Method;
use serde_json::json;
use tracing::instrument;

use tienda_core::{Cart, CartLine, ProductId};

use super::{Auth, StoreClient, decode, segment};
use crate::error::ClientError;
use crate::events::ChangeEvent;

/// What a decrement did on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line lost one unit.
    Adjusted,
    /// The line held its last unit and was removed.
    Removed,
}

impl StoreClient {
    /// Fetch the authoritative cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionMissing` without a request when no token is stored,
    /// and `Unauthorized` (after clearing the session) on a 401.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Cart, ClientError> {
        let body = self.execute(Method::GET, "api/cart/", None, Auth::Access).await?;
        let lines: Vec<CartLine> = decode(&body)?;
        Ok(Cart::from_lines(lines))
    }

    /// Add `quantity` units of a product, merging with any existing line.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a zero quantity, otherwise any request error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<(), ClientError> {
        if quantity == 0 {
            return Err(ClientError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        let body = json!({ "product_id": product_id, "quantity": quantity });
        self.execute(Method::POST, "api/cart/add", Some(body), Auth::Access)
            .await?;
        self.inner.events.publish(ChangeEvent::CartUpdated);
        Ok(())
    }

    /// Change a line's quantity by a signed delta.
    ///
    /// The server applies the delta as given. Callers taking a line to zero
    /// should use [`StoreClient::decrement`] or
    /// [`StoreClient::remove_from_cart`] instead.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a zero delta, otherwise any request error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn adjust_quantity(&self, product_id: &ProductId, delta: i32) -> Result<(), ClientError> {
        if delta == 0 {
            return Err(ClientError::Validation(
                "quantity change must not be zero".to_string(),
            ));
        }
        let body = json!({ "product_id": product_id, "quantity": delta });
        self.execute(Method::PUT, "api/cart/update", Some(body), Auth::Access)
            .await?;
        self.inner.events.publish(ChangeEvent::CartUpdated);
        Ok(())
    }

    /// Add one unit to a line.
    ///
    /// # Errors
    ///
    /// Any request error.
    pub async fn increment(&self, product_id: &ProductId) -> Result<(), ClientError> {
        self.adjust_quantity(product_id, 1).await
    }

    /// Remove one unit from a line.
    ///
    /// A line holding its last unit is removed with a DELETE rather than
    /// adjusted to zero.
    ///
    /// # Errors
    ///
    /// Any request error.
    pub async fn decrement(&self, line: &CartLine) -> Result<QuantityChange, ClientError> {
        self.decrement_from(&line.product.id, line.quantity).await
    }

    /// [`StoreClient::decrement`] for callers that only hold the displayed
    /// quantity.
    ///
    /// # Errors
    ///
    /// Any request error.
    pub async fn decrement_from(
        &self,
        product_id: &ProductId,
        current_quantity: u32,
    ) -> Result<QuantityChange, ClientError> {
        if current_quantity <= 1 {
            self.remove_from_cart(product_id).await?;
            Ok(QuantityChange::Removed)
        } else {
            self.adjust_quantity(product_id, -1).await?;
            Ok(QuantityChange::Adjusted)
        }
    }

    /// Remove a line regardless of its quantity.
    ///
    /// A 404 means the line is already gone and counts as success.
    ///
    /// # Errors
    ///
    /// Any request error other than 404.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let path = format!("api/cart/remove/{}", segment(product_id.as_str()));
        match self.execute(Method::DELETE, &path, None, Auth::Access).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("cart line already absent");
            }
            Err(e) => return Err(e),
        }
        self.inner.events.publish(ChangeEvent::CartUpdated);
        Ok(())
    }
}
