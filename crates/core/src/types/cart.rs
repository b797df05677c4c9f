//! Shopping cart domain types.
//!
//! The cart holds its items as `Arc`s so that deriving a new cart state (a
//! quantity change, a removal) only reallocates the touched item; untouched
//! items keep pointer identity and consumers doing cheap change detection
//! never see a new allocation for an unchanged row.
//!
//! Totals are methods, never stored fields: `item_count`, `subtotal`,
//! `tax_amount`, and `total` are always recomputed from the current item
//! list, so no copy exists that could drift out of sync.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId};

/// Minimum quantity for a single cart line.
pub const QUANTITY_MIN: u32 = 1;

/// Maximum quantity for a single cart line.
pub const QUANTITY_MAX: u32 = 99;

/// Returns true if `quantity` is within the allowed `[1, 99]` range.
#[must_use]
pub const fn quantity_in_bounds(quantity: u32) -> bool {
    quantity >= QUANTITY_MIN && quantity <= QUANTITY_MAX
}

/// Product snapshot carried by a cart item.
///
/// Captured by the backend when the item is added; the price lives on the
/// item itself (frozen at add time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Stock-keeping unit.
    pub sku: Option<String>,
    /// Primary image URL, if the product has one.
    pub image: Option<String>,
    /// Whether the product is currently in stock.
    pub in_stock: bool,
    /// Units available.
    pub stock_quantity: u32,
}

/// A single line in the cart.
///
/// Owned by exactly one [`Cart`]; the ID is server-assigned and stable for
/// the life of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Server-assigned cart item ID.
    pub id: CartItemId,
    /// Product snapshot.
    pub product: CartProduct,
    /// Quantity, `1..=99`.
    pub quantity: u32,
    /// Price per unit, frozen when the item was added.
    pub unit_price: Decimal,
    /// When the item was added to the cart.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Line subtotal: `unit_price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Derived cart totals, produced by [`Cart::totals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Total number of units across all lines.
    pub item_count: u32,
    /// Sum of line subtotals, rounded to 2 decimals.
    pub subtotal: Decimal,
    /// `subtotal × tax rate`, rounded to 2 decimals.
    pub tax_amount: Decimal,
    /// `subtotal + tax_amount`.
    pub total: Decimal,
}

/// The in-memory shopping cart.
///
/// Item order is insertion/display order and carries no correctness
/// significance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<Arc<CartItem>>,
}

impl Cart {
    /// Create a cart from a list of items.
    #[must_use]
    pub fn new(items: Vec<Arc<CartItem>>) -> Self {
        Self { items }
    }

    /// Fixed sales-tax rate (9%) applied by the backend, mirrored locally
    /// for derived totals.
    #[must_use]
    pub fn tax_rate() -> Decimal {
        Decimal::new(9, 2)
    }

    /// The cart lines, in display order.
    #[must_use]
    pub fn items(&self) -> &[Arc<CartItem>] {
        &self.items
    }

    /// Number of lines (not units) in the cart.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by its server-assigned ID.
    #[must_use]
    pub fn get(&self, id: CartItemId) -> Option<&Arc<CartItem>> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of line subtotals, rounded to 2 decimals (banker's rounding,
    /// matching the backend).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.subtotal())
            .sum::<Decimal>()
            .round_dp(2)
    }

    /// Tax on the subtotal, rounded to 2 decimals.
    #[must_use]
    pub fn tax_amount(&self) -> Decimal {
        (self.subtotal() * Self::tax_rate()).round_dp(2)
    }

    /// Grand total: `subtotal + tax_amount`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax_amount()
    }

    /// Snapshot of all derived totals.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.item_count(),
            subtotal: self.subtotal(),
            tax_amount: self.tax_amount(),
            total: self.total(),
        }
    }

    /// Derive a new cart with the given line set to `quantity`.
    ///
    /// Only the touched line is reallocated; every other line keeps its
    /// `Arc` identity. Returns `None` if the line is not present.
    #[must_use]
    pub fn with_item_quantity(&self, id: CartItemId, quantity: u32) -> Option<Self> {
        self.get(id)?;
        let items = self
            .items
            .iter()
            .map(|item| {
                if item.id == id {
                    Arc::new(CartItem {
                        quantity,
                        ..(**item).clone()
                    })
                } else {
                    Arc::clone(item)
                }
            })
            .collect();
        Some(Self { items })
    }

    /// Derive a new cart with the given line removed.
    ///
    /// Remaining lines keep their `Arc` identity. Returns `None` if the line
    /// is not present.
    #[must_use]
    pub fn without_item(&self, id: CartItemId) -> Option<Self> {
        self.get(id)?;
        let items = self
            .items
            .iter()
            .filter(|item| item.id != id)
            .map(Arc::clone)
            .collect();
        Some(Self { items })
    }
}
