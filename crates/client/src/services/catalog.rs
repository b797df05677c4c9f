//! Catalog service.
//!
//! Read-only product data, cached with `moka` (5-minute TTL). Carts and
//! sessions are never cached; catalog pages are safe to serve slightly
//! stale.

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use marbelle_core::{ProductId, ProductSummary};

use crate::api::Page;
use crate::error::ApiError;
use crate::session::{Auth, SessionClient};

const PRODUCTS_PATH: &str = "/products/";

/// Cached catalog responses.
#[derive(Clone)]
enum CacheValue {
    Product(Box<ProductSummary>),
    Products(Page<ProductSummary>),
}

/// Typed access to the public catalog endpoints.
#[derive(Clone)]
pub struct CatalogService {
    session: SessionClient,
    cache: Cache<String, CacheValue>,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(session: SessionClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self { session, cache }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<ProductSummary, ApiError> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.cache.get(&cache_key).await {
            debug!("cache hit for product");
            return Ok(*product);
        }

        let product: ProductSummary = self
            .session
            .get(&format!("{PRODUCTS_PATH}{product_id}/"), Auth::None)
            .await?;

        self.cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a page of the product listing.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: Option<u32>) -> Result<Page<ProductSummary>, ApiError> {
        let cache_key = format!("products:{}", page.unwrap_or(1));

        if let Some(CacheValue::Products(products)) = self.cache.get(&cache_key).await {
            debug!("cache hit for products");
            return Ok(products);
        }

        let path = page.map_or_else(
            || PRODUCTS_PATH.to_owned(),
            |page| format!("{PRODUCTS_PATH}?page={page}"),
        );
        let products: Page<ProductSummary> = self.session.get_paged(&path, Auth::None).await?;

        self.cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Invalidate all cached catalog data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
