//! Integration tests for the cart state manager.
//!
//! Covers the optimistic-mutation lifecycle end to end: instant local
//! publish, server confirmation, rollback + resync on failure, and the cart
//! arithmetic invariants along the way.

use marbelle_client::ApiError;
use marbelle_core::{CartItemId, ProductId};
use marbelle_integration_tests::TestContext;
use rust_decimal::Decimal;

fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// Product 1 in the stub catalog: "Bianco Tile", 20.00, stock 25.
const BIANCO: ProductId = ProductId::new(1);
/// Product 2 in the stub catalog: "Carrara Slab", 149.50, stock 4.
const CARRARA: ProductId = ProductId::new(2);

// ============================================================================
// Arithmetic Scenarios
// ============================================================================

#[tokio::test]
async fn test_add_then_update_keeps_totals_consistent() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");

    manager.add_item(BIANCO, 1).await.expect("add item");

    let state = manager.current();
    let cart = &state.cart;
    assert_eq!(cart.item_count(), 1);
    assert_eq!(cart.subtotal(), dec("20.00"));
    assert_eq!(cart.tax_amount(), dec("1.80"));
    assert_eq!(cart.total(), dec("21.80"));

    let item_id = cart.items().first().expect("one line").id;
    assert_eq!(state.recently_added, Some(item_id));

    manager
        .update_quantity(item_id, 3)
        .await
        .expect("update quantity");

    let cart = manager.current().cart;
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.subtotal(), dec("60.00"));
    assert_eq!(cart.tax_amount(), dec("5.40"));
    assert_eq!(cart.total(), dec("65.40"));
}

#[tokio::test]
async fn test_totals_equal_pure_functions_across_mixed_operations() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add bianco");
    manager.add_item(CARRARA, 1).await.expect("add carrara");

    let cart = manager.current().cart;
    let totals = cart.totals();
    // 2 x 20.00 + 1 x 149.50 = 189.50; 9% tax = 17.06 (banker's rounding).
    assert_eq!(totals.item_count, 3);
    assert_eq!(totals.subtotal, dec("189.50"));
    assert_eq!(totals.tax_amount, dec("17.06"));
    assert_eq!(totals.total, dec("206.56"));

    // The published totals are the pure functions of the published items.
    assert_eq!(totals.item_count, cart.item_count());
    assert_eq!(totals.subtotal, cart.subtotal());
    assert_eq!(totals.tax_amount, cart.tax_amount());
    assert_eq!(totals.total, cart.total());
}

// ============================================================================
// Optimistic Updates & Rollback
// ============================================================================

#[tokio::test]
async fn test_update_success_keeps_optimistic_state_without_refetch() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add item");
    let item_id = manager.current().cart.items().first().expect("line").id;

    let cart_fetches = ctx.backend.request_count("GET /cart/");
    manager
        .update_quantity(item_id, 5)
        .await
        .expect("update quantity");

    // Confirmed update keeps the locally derived state; no refetch happened.
    assert_eq!(ctx.backend.request_count("GET /cart/"), cart_fetches);
    assert_eq!(
        manager.current().cart.get(item_id).expect("line").quantity,
        5
    );
}

#[tokio::test]
async fn test_failed_update_rolls_back_and_resyncs() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add item");
    let item_id = manager.current().cart.items().first().expect("line").id;
    let before = manager.current().cart;

    ctx.backend.fail_next_cart_mutation();
    let result = manager.update_quantity(item_id, 5).await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));

    // Post-resync the cart is exactly the pre-mutation state.
    let after = manager.current().cart;
    assert_eq!(after.get(item_id).expect("line").quantity, 2);
    assert_eq!(after.totals(), before.totals());
}

#[tokio::test]
async fn test_failed_add_rolls_back_and_resyncs() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");

    let resyncs_before = ctx.backend.request_count("GET /cart/");
    ctx.backend.fail_next_cart_mutation();
    let result = manager.add_item(BIANCO, 1).await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));

    assert!(manager.current().cart.is_empty());
    assert!(manager.current().recently_added.is_none());
    // The failure path refetched to resolve ambiguity.
    assert_eq!(ctx.backend.request_count("GET /cart/"), resyncs_before + 1);
}

#[tokio::test]
async fn test_failed_remove_restores_item() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add item");
    let item_id = manager.current().cart.items().first().expect("line").id;

    ctx.backend.fail_next_cart_mutation();
    let result = manager.remove_item(item_id).await;
    assert!(matches!(result, Err(ApiError::Validation { .. })));

    let cart = manager.current().cart;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.get(item_id).expect("line").quantity, 2);
}

#[tokio::test]
async fn test_add_refetches_authoritative_cart() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");

    let fetches = ctx.backend.request_count("GET /cart/");
    manager.add_item(CARRARA, 1).await.expect("add item");
    assert_eq!(ctx.backend.request_count("GET /cart/"), fetches + 1);

    // The published line carries the server-frozen price.
    let item = manager
        .current()
        .cart
        .items()
        .first()
        .expect("line")
        .clone();
    assert_eq!(item.unit_price, dec("149.50"));
    assert_eq!(item.product.name, "Carrara Slab");
}

// ============================================================================
// Bounds & No-ops
// ============================================================================

#[tokio::test]
async fn test_out_of_bounds_quantities_never_reach_the_server() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add item");
    let item_id = manager.current().cart.items().first().expect("line").id;

    manager.update_quantity(item_id, 0).await.expect("no-op");
    manager.update_quantity(item_id, 100).await.expect("no-op");

    assert_eq!(ctx.backend.request_count("PATCH /cart/items/"), 0);
    assert_eq!(
        manager.current().cart.get(item_id).expect("line").quantity,
        2
    );
}

#[tokio::test]
async fn test_unknown_item_mutations_are_noops() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");

    manager
        .update_quantity(CartItemId::new(404), 5)
        .await
        .expect("no-op");
    manager.remove_item(CartItemId::new(404)).await.expect("no-op");

    assert_eq!(ctx.backend.request_count("PATCH /cart/items/"), 0);
    assert_eq!(ctx.backend.request_count("DELETE /cart/items/"), 0);
}

// ============================================================================
// Remove, Clear, Highlight
// ============================================================================

#[tokio::test]
async fn test_remove_item_confirms_without_refetch() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 1).await.expect("add bianco");
    manager.add_item(CARRARA, 1).await.expect("add carrara");

    let item_id = manager.current().cart.items().first().expect("line").id;
    let fetches = ctx.backend.request_count("GET /cart/");

    manager.remove_item(item_id).await.expect("remove item");

    assert_eq!(ctx.backend.request_count("GET /cart/"), fetches);
    let cart = manager.current().cart;
    assert_eq!(cart.len(), 1);
    assert!(cart.get(item_id).is_none());

    // The server agrees.
    manager.load().await.expect("reload");
    assert_eq!(manager.current().cart.len(), 1);
}

#[tokio::test]
async fn test_clear_cart() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 2).await.expect("add bianco");
    manager.add_item(CARRARA, 1).await.expect("add carrara");

    manager.clear().await.expect("clear cart");
    assert!(manager.current().cart.is_empty());

    manager.load().await.expect("reload");
    assert!(manager.current().cart.is_empty());
}

#[tokio::test]
async fn test_highlight_is_set_on_add_and_dismissable() {
    let ctx = TestContext::new().await;
    ctx.login().await;

    let manager = ctx.cart_manager();
    manager.load().await.expect("load cart");
    manager.add_item(BIANCO, 1).await.expect("add item");

    let state = manager.current();
    let item_id = state.cart.items().first().expect("line").id;
    assert_eq!(state.recently_added, Some(item_id));

    manager.dismiss_highlight();
    assert!(manager.current().recently_added.is_none());
}

// ============================================================================
// Guest Carts
// ============================================================================

#[tokio::test]
async fn test_guest_cart_echoes_session_header() {
    let ctx = TestContext::new().await;

    let manager = ctx.cart_manager();
    // First request is anonymous; the backend assigns a guest session.
    manager.load().await.expect("load guest cart");
    assert_eq!(ctx.backend.guest_tagged_requests(), 0);

    // Subsequent requests carry the assigned ID back.
    manager.add_item(BIANCO, 1).await.expect("guest add");
    assert!(ctx.backend.guest_tagged_requests() >= 1);

    let cart = manager.current().cart;
    assert_eq!(cart.item_count(), 1);
    assert_eq!(cart.subtotal(), dec("20.00"));
}
