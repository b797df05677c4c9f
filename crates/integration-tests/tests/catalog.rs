//! Integration tests for the cached catalog service.

use marbelle_client::ApiError;
use marbelle_core::ProductId;
use marbelle_integration_tests::TestContext;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_list_products_with_pagination() {
    let ctx = TestContext::new().await;

    let page = ctx
        .catalog()
        .list_products(None)
        .await
        .expect("list products");
    assert_eq!(page.count, 3);
    assert_eq!(page.results.len(), 3);
    assert!(page.next.is_none());

    let bianco = page
        .results
        .iter()
        .find(|product| product.id == ProductId::new(1))
        .expect("seeded product");
    assert_eq!(bianco.price, "20.00".parse::<Decimal>().expect("decimal"));
    assert!(bianco.in_stock);
}

#[tokio::test]
async fn test_product_detail_is_cached() {
    let ctx = TestContext::new().await;
    let catalog = ctx.catalog();

    let first = catalog
        .get_product(ProductId::new(2))
        .await
        .expect("product fetch");
    let second = catalog
        .get_product(ProductId::new(2))
        .await
        .expect("cached fetch");

    assert_eq!(first, second);
    assert_eq!(ctx.backend.request_count("GET /products/2/"), 1);

    catalog.invalidate_all().await;
    catalog
        .get_product(ProductId::new(2))
        .await
        .expect("fetch after invalidation");
    assert_eq!(ctx.backend.request_count("GET /products/2/"), 2);
}

#[tokio::test]
async fn test_product_listing_is_cached() {
    let ctx = TestContext::new().await;
    let catalog = ctx.catalog();

    catalog.list_products(None).await.expect("list products");
    catalog.list_products(None).await.expect("cached list");

    assert_eq!(ctx.backend.request_count("GET /products/"), 1);
}

#[tokio::test]
async fn test_missing_product_is_a_validation_error() {
    let ctx = TestContext::new().await;

    let result = ctx.catalog().get_product(ProductId::new(404)).await;
    let Err(ApiError::Validation { message, .. }) = result else {
        panic!("expected validation error");
    };
    assert_eq!(message, "Product not found.");
}
