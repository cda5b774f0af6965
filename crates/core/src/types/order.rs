//! Orders as returned by the orders endpoint.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{OrderId, OrderStatus, PaymentMethod, Price, ProductId, ShippingAddress, ShippingMethod};

/// One purchased line, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Price,
    #[serde(default)]
    pub name: String,
}

/// An order receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub subtotal: Option<Price>,
    #[serde(default)]
    pub shipping_cost: Price,
    #[serde(default)]
    pub discount: Price,
    pub total: Price,
    #[serde(default)]
    pub status: OrderStatus,
    /// Server timestamps carry no offset.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Order {
    /// Total units across all items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_receipt() {
        let json = r#"{
            "_id": "o1",
            "user_id": "u1",
            "items": [{"product_id": "a", "quantity": 2, "price": 100, "name": "A"}],
            "shipping_method": "express",
            "shipping_cost": 1500,
            "total": 1700,
            "status": "processing",
            "created_at": "2025-03-01T12:30:00.123456"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.id.as_str(), "o1");
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.shipping_method, ShippingMethod::Express);
        assert!(order.created_at.is_some());
    }
}
