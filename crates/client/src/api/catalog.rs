//! Public catalog endpoints.
//!
//! Listings and single products are cached for the configured TTL (five
//! minutes by default). No token is sent.

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use tienda_core::{ProductId, ProductRef};

use super::cache::{CacheKey, CacheValue};
use super::{Auth, StoreClient, decode, segment};
use crate::error::ClientError;

/// Response of the category endpoint.
#[derive(Deserialize)]
struct CategoryPage {
    products: Vec<ProductRef>,
}

impl StoreClient {
    /// All active products.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductRef>, ClientError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.catalog.get(&CacheKey::Products).await
        {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let body = self
            .execute(Method::GET, "api/products", None, Auth::None)
            .await?;
        let products: Vec<ProductRef> = decode(&body)?;

        self.inner
            .catalog
            .insert(CacheKey::Products, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or inactive products.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<ProductRef, ClientError> {
        let cache_key = CacheKey::Product(product_id.as_str().to_string());

        if let Some(CacheValue::Product(product)) = self.inner.catalog.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("api/products/{}", segment(product_id.as_str()));
        let body = self.execute(Method::GET, &path, None, Auth::None).await?;
        let product: ProductRef = decode(&body)?;

        self.inner
            .catalog
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Products in a category. The server matches names case-insensitively
    /// and treats `-` as a space.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self))]
    pub async fn products_by_category(&self, name: &str) -> Result<Vec<ProductRef>, ClientError> {
        let cache_key = CacheKey::Category(name.to_lowercase());

        if let Some(CacheValue::Products(products)) = self.inner.catalog.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(products);
        }

        let path = format!("api/products/category/{}", segment(name));
        let body = self.execute(Method::GET, &path, None, Auth::None).await?;
        let page: CategoryPage = decode(&body)?;

        self.inner
            .catalog
            .insert(cache_key, CacheValue::Products(page.products.clone()))
            .await;
        Ok(page.products)
    }

    /// Full-text product search. Results are not cached.
    ///
    /// A blank query returns no results without a request.
    ///
    /// # Errors
    ///
    /// Any request error.
    #[instrument(skip(self))]
    pub async fn search_products(&self, query: &str) -> Result<Vec<ProductRef>, ClientError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("api/products/search?q={}", urlencoding::encode(query));
        let body = self.execute(Method::GET, &path, None, Auth::None).await?;
        decode(&body)
    }

    /// Drop every cached catalog response.
    pub fn invalidate_catalog(&self) {
        self.inner.catalog.invalidate_all();
        debug!("Catalog cache invalidated");
    }
}
