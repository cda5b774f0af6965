//! Cache types for catalog responses.

use tienda_core::ProductRef;

/// Cache key for catalog lookups.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(String),
    Products,
    Category(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<ProductRef>),
    Products(Vec<ProductRef>),
}
