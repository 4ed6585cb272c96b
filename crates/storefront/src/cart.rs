//! Local shopping cart.
//!
//! The cart lives entirely on the client. Lines are unique per
//! (product, size, color); adding the same combination again merges the
//! quantities. Prices are captured when a line is created and never
//! re-fetched. Every mutation is persisted before the method returns.

use std::sync::Arc;

use bazaar_core::{PaymentMethod, Price, ProductId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{OrderItem, OrderTotals, ProductSnapshot};
use crate::pricing::PricingPolicy;
use crate::session::Session;
use crate::storage::{Storage, keys, load_versioned, remove_logged, save_versioned};

const SCHEMA_VERSION: u32 = 1;

/// Errors for refused cart actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Only signed-in shoppers may add to the cart.
    #[error("login required to add items to the cart")]
    LoginRequired,

    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

impl CartError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginRequired => "Please log in to add items to your cart".to_string(),
            Self::InvalidQuantity => "Please choose a quantity of at least 1".to_string(),
        }
    }
}

/// The variant selection that, together with the product, identifies a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineOptions {
    /// Selected size, empty when the product has none.
    #[serde(default)]
    pub size: String,
    /// Selected color, empty when the product has none.
    #[serde(default)]
    pub color: String,
}

impl LineOptions {
    #[must_use]
    pub fn new(size: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            color: color.into(),
        }
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Client-generated line ID.
    pub id: Uuid,
    /// Product data captured at add-time.
    pub product: ProductSnapshot,
    /// Always at least 1.
    pub quantity: u32,
    #[serde(flatten)]
    pub options: LineOptions,
}

impl CartLine {
    /// Whether this line is for `product` with `options`.
    #[must_use]
    pub fn matches(&self, product: &ProductId, options: &LineOptions) -> bool {
        &self.product.id == product && &self.options == options
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// Why a line would be rejected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartIssue {
    #[error("an item in your cart is no longer available")]
    MissingProduct { line_id: Uuid },

    #[error("{name} has an invalid quantity")]
    InvalidQuantity { line_id: Uuid, name: String },

    #[error("only {available} of {name} left in stock")]
    ExceedsStock {
        line_id: Uuid,
        name: String,
        available: u32,
    },
}

impl CartIssue {
    /// The offending line.
    #[must_use]
    pub const fn line_id(&self) -> Uuid {
        match self {
            Self::MissingProduct { line_id }
            | Self::InvalidQuantity { line_id, .. }
            | Self::ExceedsStock { line_id, .. } => *line_id,
        }
    }
}

/// Result of [`CartStore::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartValidation {
    pub is_valid: bool,
    pub errors: Vec<CartIssue>,
}

/// Handle to the cart. Clones share the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

struct CartInner {
    lines: Mutex<Vec<CartLine>>,
    storage: Arc<dyn Storage>,
    pricing: PricingPolicy,
}

impl CartStore {
    /// Restore the persisted cart, or start empty.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>, pricing: PricingPolicy) -> Self {
        let lines: Vec<CartLine> =
            load_versioned(storage.as_ref(), keys::CART, SCHEMA_VERSION).unwrap_or_default();
        debug!(lines = lines.len(), "Loaded cart");
        Self {
            inner: Arc::new(CartInner {
                lines: Mutex::new(lines),
                storage,
                pricing,
            }),
        }
    }

    /// The pricing policy applied to this cart.
    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.pricing
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<CartLine>) -> R) -> R {
        let mut lines = self.inner.lines.lock();
        let result = f(&mut lines);
        save_versioned(
            self.inner.storage.as_ref(),
            keys::CART,
            SCHEMA_VERSION,
            &*lines,
        );
        result
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product variant, merging with an existing
    /// line for the same variant. Returns the line ID.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LoginRequired` for an anonymous session and
    /// `CartError::InvalidQuantity` for a zero quantity. Nothing changes in
    /// either case.
    pub fn add_item(
        &self,
        session: &Session,
        product: &ProductSnapshot,
        quantity: u32,
        options: LineOptions,
    ) -> Result<Uuid, CartError> {
        if !session.is_authenticated() {
            return Err(CartError::LoginRequired);
        }
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let line_id = self.mutate(|lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.matches(&product.id, &options)) {
                line.quantity = line.quantity.saturating_add(quantity);
                line.id
            } else {
                let line = CartLine {
                    id: Uuid::new_v4(),
                    product: product.clone(),
                    quantity,
                    options,
                };
                let id = line.id;
                lines.push(line);
                id
            }
        });

        debug!(product_id = %product.id, quantity, "Added to cart");
        Ok(line_id)
    }

    /// Remove a line. Removing a missing line does nothing.
    pub fn remove_item(&self, line_id: Uuid) {
        self.mutate(|lines| lines.retain(|l| l.id != line_id));
    }

    /// Set a line's quantity exactly. Zero or less removes the line; a
    /// missing line is ignored.
    pub fn update_quantity(&self, line_id: Uuid, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(line_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        self.mutate(|lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.id == line_id) {
                line.quantity = quantity;
            }
        });
    }

    /// Add one unit to a line.
    pub fn increment(&self, line_id: Uuid) {
        self.mutate(|lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.id == line_id) {
                line.quantity = line.quantity.saturating_add(1);
            }
        });
    }

    /// Take one unit off a line, removing it at zero.
    pub fn decrement(&self, line_id: Uuid) {
        self.mutate(|lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.id == line_id) {
                line.quantity = line.quantity.saturating_sub(1);
            }
            lines.retain(|l| l.quantity > 0);
        });
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.mutate(Vec::clear);
    }

    /// Take the units of a placed order out of the cart.
    ///
    /// Each item is matched to a line by product, size and color and its
    /// ordered quantity is subtracted. Lines that reach zero are dropped.
    /// Lines the order does not mention are left alone.
    pub fn remove_ordered(&self, items: &[OrderItem]) {
        if items.is_empty() {
            return;
        }
        self.mutate(|lines| {
            for item in items {
                let options = LineOptions::new(item.size.as_str(), item.color.as_str());
                if let Some(line) = lines.iter_mut().find(|l| l.matches(&item.product, &options)) {
                    line.quantity = line.quantity.saturating_sub(item.quantity);
                }
            }
            lines.retain(|l| l.quantity > 0);
        });
        debug!(items = items.len(), "Removed ordered items from cart");
    }

    /// Empty the cart and delete its persisted copy.
    pub fn purge(&self) {
        self.inner.lines.lock().clear();
        remove_logged(self.inner.storage.as_ref(), keys::CART);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Copy of all lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.inner.lines.lock().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lines.lock().is_empty()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.lines.lock().iter().map(|l| l.quantity).sum()
    }

    /// Whether a line exists for this product variant.
    #[must_use]
    pub fn is_in_cart(&self, product: &ProductId, options: &LineOptions) -> bool {
        self.inner
            .lines
            .lock()
            .iter()
            .any(|l| l.matches(product, options))
    }

    /// Quantity of this product variant in the cart, zero if absent.
    #[must_use]
    pub fn item_quantity(&self, product: &ProductId, options: &LineOptions) -> u32 {
        self.inner
            .lines
            .lock()
            .iter()
            .find(|l| l.matches(product, options))
            .map_or(0, |l| l.quantity)
    }

    fn exact_subtotal(&self) -> Price {
        self.inner.lines.lock().iter().map(CartLine::line_total).sum()
    }

    /// Sum of line totals, rounded.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.exact_subtotal().rounded()
    }

    #[must_use]
    pub fn shipping_cost(&self) -> Price {
        self.inner.pricing.shipping_cost(self.exact_subtotal())
    }

    #[must_use]
    pub fn tax(&self) -> Price {
        self.inner.pricing.tax(self.exact_subtotal())
    }

    /// Payment processing fee for `method`. Zero for cash on delivery.
    #[must_use]
    pub fn payment_fee(&self, method: PaymentMethod) -> Price {
        self.inner.pricing.payment_fee(self.exact_subtotal(), method)
    }

    /// Amount payable with `method`.
    #[must_use]
    pub fn grand_total(&self, method: PaymentMethod) -> Price {
        self.totals(method).total_amount
    }

    /// Full money breakdown with `method`.
    #[must_use]
    pub fn totals(&self, method: PaymentMethod) -> OrderTotals {
        self.inner.pricing.quote(self.exact_subtotal(), method)
    }

    /// Lines in the shape the order endpoint expects.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.inner
            .lines
            .lock()
            .iter()
            .map(|l| OrderItem {
                product: l.product.id.clone(),
                name: l.product.name.clone(),
                image: l.product.image.clone(),
                price: l.product.price,
                quantity: l.quantity,
                size: l.options.size.clone(),
                color: l.options.color.clone(),
            })
            .collect()
    }

    /// Check every line and report all problems.
    #[must_use]
    pub fn validate(&self) -> CartValidation {
        let lines = self.inner.lines.lock();
        let mut errors = Vec::new();

        for line in lines.iter() {
            let product = &line.product;
            if product.id.as_str().is_empty() || product.name.trim().is_empty() {
                errors.push(CartIssue::MissingProduct { line_id: line.id });
                continue;
            }
            if line.quantity == 0 {
                errors.push(CartIssue::InvalidQuantity {
                    line_id: line.id,
                    name: product.name.clone(),
                });
            }
            if let Some(available) = product.stock
                && line.quantity > available
            {
                errors.push(CartIssue::ExceedsStock {
                    line_id: line.id,
                    name: product.name.clone(),
                    available,
                });
            }
        }

        CartValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("lines", &*self.inner.lines.lock())
            .field("pricing", &self.inner.pricing)
            .finish_non_exhaustive()
    }
}
