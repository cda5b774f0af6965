//! Checkout and order receipts.

use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use tienda_core::{CheckoutRequest, Order, OrderId};

use super::{Auth, StoreClient, decode, segment};
use crate::error::ClientError;
use crate::events::ChangeEvent;

#[derive(Deserialize)]
struct CheckoutResponse {
    order_id: OrderId,
}

#[derive(Deserialize)]
struct OrderResponse {
    order: Order,
}

impl StoreClient {
    /// Place an order for the given request.
    ///
    /// Publishes `CartUpdated` on success since the server may have emptied
    /// the cart.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a request without items, otherwise any
    /// request error.
    #[instrument(skip(self, request), fields(items = request.items.len(), total = %request.total))]
    pub async fn checkout(&self, request: &CheckoutRequest) -> Result<OrderId, ClientError> {
        if request.items.is_empty() {
            return Err(ClientError::Validation("cart is empty".to_string()));
        }
        let body = serde_json::to_value(request)?;
        let response = self
            .execute(Method::POST, "api/orders/checkout", Some(body), Auth::Access)
            .await?;
        let created: CheckoutResponse = decode(&response)?;

        tracing::info!(order_id = %created.order_id, "order placed");
        self.inner.events.publish(ChangeEvent::CartUpdated);
        Ok(created.order_id)
    }

    /// Fetch an order receipt.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown orders or orders of another user.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, ClientError> {
        let path = format!("api/orders/{}", segment(order_id.as_str()));
        let body = self.execute(Method::GET, &path, None, Auth::Access).await?;
        let response: OrderResponse = decode(&body)?;
        Ok(response.order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;
    use tienda_core::{
        Cart, CartLine, PaymentMethod, Price, ProductRef, ShippingAddress, ShippingMethod,
    };

    use super::super::test_support::client_for;
    use super::*;

    fn request() -> CheckoutRequest {
        let cart = Cart::from_lines(vec![CartLine {
            product: ProductRef::new("A", "Mate", Price::from_units(1200)),
            quantity: 2,
        }]);
        CheckoutRequest::from_cart(
            &cart,
            ShippingAddress::default(),
            PaymentMethod::Transfer,
            ShippingMethod::Standard,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_returns_order_id() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/orders/checkout")
                    .json_body_partial(r#"{"payment_method": "transfer", "shipping_method": "standard"}"#);
                then.status(201).json_body(json!({
                    "success": true,
                    "order_id": "o1",
                    "message": "Orden creada exitosamente"
                }));
            })
            .await;

        let client = client_for(&server, Some("tok"));
        let order_id = client.checkout(&request()).await.unwrap();

        assert_eq!(order_id, OrderId::new("o1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/orders/o1");
                then.status(200).json_body(json!({
                    "success": true,
                    "order": {
                        "_id": "o1",
                        "items": [{"product_id": "A", "quantity": 2, "price": 1200, "name": "Mate"}],
                        "total": 3200,
                        "status": "pending"
                    }
                }));
            })
            .await;

        let client = client_for(&server, Some("tok"));
        let order = client.get_order(&OrderId::new("o1")).await.unwrap();
        assert_eq!(order.item_count(), 2);
    }
}
