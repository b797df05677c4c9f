//! Cart state manager.
//!
//! Presents a cart that feels instantaneous while staying eventually
//! consistent with the authoritative server state. Every mutating operation
//! walks an explicit three-phase machine:
//!
//! `idle -> optimistic-applied -> {server-confirmed | rolled-back-and-resynced} -> idle`
//!
//! 1. Snapshot the currently published cart.
//! 2. For quantity/removal changes, derive the new cart locally and publish
//!    it immediately; untouched lines keep their `Arc` identity.
//! 3. Round-trip through [`CartService`].
//! 4. Confirmed update/remove keeps the optimistic state (it was derived
//!    from trusted local data; a refetch would be a redundant round trip).
//!    A confirmed add refetches; the server-computed line is not knowable
//!    locally.
//! 5. Failure restores the snapshot, refetches to resolve any ambiguity
//!    about true server state, and re-throws for the UI.
//!
//! State is published through a `watch` channel; consumers subscribe and
//! re-render on change. The cart is owned by one manager per application
//! session and only mutated through these operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use marbelle_core::{Cart, CartItemId, ProductId, quantity_in_bounds};

use crate::error::ApiError;
use crate::services::CartService;

/// How long the "recently added" highlight lasts before auto-clearing.
const RECENTLY_ADDED_TTL: Duration = Duration::from_secs(4);

/// The published cart view.
///
/// `recently_added` is ephemeral display state, deliberately outside the
/// [`Cart`] entity: it is set after a successful add and cleared after
/// [`RECENTLY_ADDED_TTL`] or an explicit dismissal.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    /// The cart. Totals are derived via its methods and can never drift
    /// from the item list.
    pub cart: Cart,
    /// Line to highlight as just-added, if any.
    pub recently_added: Option<CartItemId>,
}

/// Owner of the in-memory cart.
///
/// Cheap to clone; all clones share the same published state.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    service: CartService,
    state: watch::Sender<CartState>,
    // Bumped on every highlight change so a stale auto-clear timer
    // recognizes it lost.
    highlight_seq: AtomicU64,
}

impl CartManager {
    /// Create a manager with an empty local cart.
    #[must_use]
    pub fn new(service: CartService) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartManagerInner {
                service,
                state,
                highlight_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to published cart states.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the currently published state.
    #[must_use]
    pub fn current(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    // =========================================================================
    // Server-backed Operations
    // =========================================================================

    /// Fetch the authoritative cart and publish it.
    ///
    /// Used on mount and after login.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants; the published state is
    /// left untouched on failure.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), ApiError> {
        let cart = self.inner.service.get_cart().await?;
        self.publish_cart(cart);
        Ok(())
    }

    /// Add a product to the cart.
    ///
    /// No optimistic insert happens; the server computes the new line
    /// (frozen unit price, stock snapshot), so a confirmed add is followed
    /// by an authoritative refetch. The new line is then highlighted for
    /// [`RECENTLY_ADDED_TTL`].
    ///
    /// Quantities outside `[1, 99]` are no-ops.
    ///
    /// # Errors
    ///
    /// Re-throws the service error after rollback + resync.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        if !quantity_in_bounds(quantity) {
            debug!("quantity out of bounds, ignoring add");
            return Ok(());
        }

        let snapshot = self.current().cart;

        match self.inner.service.add_item(product_id, quantity).await {
            Ok(item) => {
                let cart = self.inner.service.get_cart().await?;
                self.publish_cart(cart);
                self.set_highlight(item.id);
                Ok(())
            }
            Err(error) => {
                self.rollback_and_resync(snapshot).await;
                Err(error)
            }
        }
    }

    /// Set the quantity of a cart line, optimistically.
    ///
    /// Quantities outside `[1, 99]` are no-ops, as is a line that is not in
    /// the published cart (only possible when racing a removal; the other
    /// operation's round trip settles the authoritative state).
    ///
    /// # Errors
    ///
    /// Re-throws the service error after rollback + resync.
    #[instrument(skip(self), fields(item_id = %item_id, quantity))]
    pub async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<(), ApiError> {
        if !quantity_in_bounds(quantity) {
            debug!("quantity out of bounds, ignoring update");
            return Ok(());
        }

        let snapshot = self.current().cart;
        let Some(optimistic) = snapshot.with_item_quantity(item_id, quantity) else {
            debug!("item not in published cart, ignoring update");
            return Ok(());
        };
        self.publish_cart(optimistic);

        match self.inner.service.update_item(item_id, quantity).await {
            // Confirmed: keep the optimistic state. It was derived from
            // trusted local data, so the refetch round trip is skipped.
            Ok(_) => Ok(()),
            Err(error) => {
                self.rollback_and_resync(snapshot).await;
                Err(error)
            }
        }
    }

    /// Remove a cart line, optimistically.
    ///
    /// A line that is not in the published cart is a no-op.
    ///
    /// # Errors
    ///
    /// Re-throws the service error after rollback + resync.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: CartItemId) -> Result<(), ApiError> {
        let snapshot = self.current().cart;
        let Some(optimistic) = snapshot.without_item(item_id) else {
            debug!("item not in published cart, ignoring remove");
            return Ok(());
        };
        self.publish_cart(optimistic);

        match self.inner.service.remove_item(item_id).await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.rollback_and_resync(snapshot).await;
                Err(error)
            }
        }
    }

    /// Empty the cart, optimistically.
    ///
    /// # Errors
    ///
    /// Re-throws the service error after rollback + resync.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ApiError> {
        let snapshot = self.current().cart;
        self.publish_cart(Cart::default());

        match self.inner.service.clear().await {
            Ok(_) => Ok(()),
            Err(error) => {
                self.rollback_and_resync(snapshot).await;
                Err(error)
            }
        }
    }

    // =========================================================================
    // Local-only Operations
    // =========================================================================

    /// Drop the local cart without a server call.
    ///
    /// Used on logout, when the session (and with it the server-side cart
    /// binding) is gone.
    pub fn clear_local(&self) {
        self.inner.highlight_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.state.send_replace(CartState::default());
    }

    /// Clear the "recently added" highlight immediately.
    pub fn dismiss_highlight(&self) {
        self.inner.highlight_seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .state
            .send_modify(|state| state.recently_added = None);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn publish_cart(&self, cart: Cart) {
        self.inner.state.send_modify(|state| state.cart = cart);
    }

    /// Highlight a just-added line and schedule the auto-clear.
    ///
    /// A later highlight (or dismissal) bumps the sequence, so a stale timer
    /// firing afterwards leaves the newer highlight alone.
    fn set_highlight(&self, item_id: CartItemId) {
        let seq = self.inner.highlight_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .state
            .send_modify(|state| state.recently_added = Some(item_id));

        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(RECENTLY_ADDED_TTL).await;
            if let Some(inner) = inner.upgrade()
                && inner.highlight_seq.load(Ordering::Relaxed) == seq
            {
                inner.state.send_modify(|state| state.recently_added = None);
            }
        });
    }

    /// Failure path: restore the pre-mutation snapshot, then refetch the
    /// authoritative cart. If the resync itself fails the snapshot stands;
    /// the next successful operation or `load` settles it.
    async fn rollback_and_resync(&self, snapshot: Cart) {
        warn!("cart mutation failed, rolling back");
        self.publish_cart(snapshot);

        match self.inner.service.get_cart().await {
            Ok(cart) => self.publish_cart(cart),
            Err(error) => debug!(%error, "resync after rollback failed, keeping snapshot"),
        }
    }
}
