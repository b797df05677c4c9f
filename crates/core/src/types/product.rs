//! Catalog product types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// A catalog product as shown in listings and detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Stock-keeping unit.
    pub sku: Option<String>,
    /// Current list price.
    pub price: Decimal,
    /// Units available.
    pub stock_quantity: u32,
    /// Whether the product can currently be added to a cart.
    pub in_stock: bool,
    /// Primary image URL, if any.
    pub image: Option<String>,
}
