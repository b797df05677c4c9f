//! Cart service.
//!
//! Raw cart endpoint wrappers. State handling (optimistic updates, rollback)
//! lives in [`crate::cart`]; this service only moves payloads.

use tracing::instrument;

use marbelle_core::{Cart, CartItem, CartItemId, CartTotals, ProductId};

use crate::api::{
    AddItemRequest, CartPayload, ItemMutationPayload, TotalsPayload, UpdateItemRequest,
    convert_cart, convert_cart_item,
};
use crate::error::ApiError;
use crate::session::{Auth, SessionClient};

const CART_PATH: &str = "/cart/";
const CART_ITEMS_PATH: &str = "/cart/items/";
const CART_CLEAR_PATH: &str = "/cart/clear/";

fn item_path(item_id: CartItemId) -> String {
    format!("{CART_ITEMS_PATH}{item_id}/")
}

fn item_remove_path(item_id: CartItemId) -> String {
    format!("{CART_ITEMS_PATH}{item_id}/remove/")
}

/// Typed access to the cart endpoints.
///
/// Works for guests too: cart endpoints accept unauthenticated requests and
/// the session client echoes the backend-assigned guest session ID.
#[derive(Clone)]
pub struct CartService {
    session: SessionClient,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(session: SessionClient) -> Self {
        Self { session }
    }

    /// Fetch the authoritative cart.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self))]
    pub async fn get_cart(&self) -> Result<Cart, ApiError> {
        let payload: CartPayload = self.session.get(CART_PATH, Auth::Bearer).await?;
        Ok(convert_cart(payload))
    }

    /// Add a product to the cart (or extend the existing line's quantity).
    ///
    /// Returns the server-computed line, including the frozen unit price.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn add_item(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, ApiError> {
        let data: ItemMutationPayload = self
            .session
            .post(
                CART_ITEMS_PATH,
                &AddItemRequest {
                    product_id,
                    quantity,
                },
                Auth::Bearer,
            )
            .await?;
        Ok(convert_cart_item(data.item))
    }

    /// Set the quantity of an existing cart line.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self), fields(item_id = %item_id, quantity))]
    pub async fn update_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, ApiError> {
        let data: ItemMutationPayload = self
            .session
            .patch(&item_path(item_id), &UpdateItemRequest { quantity }, Auth::Bearer)
            .await?;
        Ok(convert_cart_item(data.item))
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: CartItemId) -> Result<CartTotals, ApiError> {
        let data: TotalsPayload = self
            .session
            .delete(&item_remove_path(item_id), Auth::Bearer)
            .await?;
        Ok(data.cart_totals)
    }

    /// Remove every line from the cart.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<CartTotals, ApiError> {
        let data: TotalsPayload = self.session.delete(CART_CLEAR_PATH, Auth::Bearer).await?;
        Ok(data.cart_totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_paths() {
        assert_eq!(item_path(CartItemId::new(7)), "/cart/items/7/");
        assert_eq!(item_remove_path(CartItemId::new(7)), "/cart/items/7/remove/");
    }
}
