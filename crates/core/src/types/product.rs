//! Product snapshots as returned by the catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// An immutable snapshot of a catalog product.
///
/// Carts and wishlists hold a copy of the product as it was when the list
/// was fetched, not a live link into the catalog. Fields the client does not
/// model are preserved in `extra` so a snapshot survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Product id (`_id` on the wire).
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Current unit price.
    pub price: Price,
    /// Primary image URL.
    #[serde(default)]
    pub main_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Price before discount, when the product is on sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub is_featured: bool,
    /// Unmodelled fields, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProductRef {
    /// Create a minimal snapshot with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, title: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            price,
            main_image: String::new(),
            description: String::new(),
            original_price: None,
            category: None,
            image_urls: Vec::new(),
            stock: 0,
            brand: None,
            rating: 0.0,
            review_count: 0,
            is_featured: false,
            extra: BTreeMap::new(),
        }
    }

    /// Whether at least `quantity` units are in stock.
    #[must_use]
    pub const fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }

    /// Whether the product is currently discounted.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }
}
