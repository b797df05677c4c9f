//! Conversions from wire payloads to domain types.

use std::sync::Arc;

use marbelle_core::{Cart, CartItem};

use super::{CartItemPayload, CartPayload};

/// Convert a cart payload into the domain [`Cart`].
pub fn convert_cart(payload: CartPayload) -> Cart {
    Cart::new(
        payload
            .items
            .into_iter()
            .map(|item| Arc::new(convert_cart_item(item)))
            .collect(),
    )
}

/// Convert a single cart line payload into a domain [`CartItem`].
pub fn convert_cart_item(payload: CartItemPayload) -> CartItem {
    CartItem {
        id: payload.id,
        product: payload.product,
        quantity: payload.quantity,
        unit_price: payload.unit_price,
        added_at: payload.created_at,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marbelle_core::CartItemId;
    use rust_decimal::Decimal;

    #[test]
    fn test_convert_cart() {
        let payload: CartPayload = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "id": 1,
                    "product": {
                        "id": 10,
                        "name": "Nero Tile",
                        "sku": null,
                        "stock_quantity": 12,
                        "in_stock": true,
                        "image": null
                    },
                    "quantity": 3,
                    "unit_price": "20.00",
                    "created_at": "2026-03-01T12:00:00Z"
                }
            ]
        }))
        .unwrap();

        let cart = convert_cart(payload);
        assert_eq!(cart.len(), 1);
        let item = cart.get(CartItemId::new(1)).unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(cart.subtotal(), "60.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_convert_cart_empty() {
        let payload: CartPayload = serde_json::from_value(serde_json::json!({ "items": [] })).unwrap();
        assert!(convert_cart(payload).is_empty());
    }
}
