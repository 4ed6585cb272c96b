//! Orders and payment handoff types.

use bazaar_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::AddressDetails;

/// A frozen order line: what was bought, at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product reference.
    pub product: ProductId,
    /// Product name at purchase time.
    pub name: String,
    /// Image URL at purchase time.
    #[serde(default)]
    pub image: Option<String>,
    /// Unit price at purchase time.
    pub price: Price,
    /// Quantity ordered.
    pub quantity: u32,
    /// Selected size (empty when not applicable).
    #[serde(default)]
    pub size: String,
    /// Selected color (empty when not applicable).
    #[serde(default)]
    pub color: String,
}

impl OrderItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// The money breakdown of an order.
///
/// `tax_amount` (GST) and `payment_fee` (gateway processing charge) are
/// separate charges and are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of line totals.
    pub subtotal: Price,
    /// Shipping charge.
    pub shipping_cost: Price,
    /// Tax on the subtotal.
    pub tax_amount: Price,
    /// Payment processing fee (online payments only).
    #[serde(default)]
    pub payment_fee: Price,
    /// Amount payable.
    pub total_amount: Price,
}

/// Order-creation request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Lines copied from the cart.
    pub items: Vec<OrderItem>,
    /// Full copy of the chosen address.
    pub shipping_address: AddressDetails,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Client-computed totals.
    #[serde(flatten)]
    pub totals: OrderTotals,
}

/// An order as the backend reports it.
///
/// The item, price and address snapshot never changes once created, so this
/// type only exposes read accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    id: OrderId,
    order_number: String,
    items: Vec<OrderItem>,
    shipping_address: AddressDetails,
    payment_method: PaymentMethod,
    #[serde(flatten)]
    totals: OrderTotals,
    #[serde(alias = "orderStatus")]
    status: OrderStatus,
    #[serde(default)]
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Backend order ID.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Human-readable order number.
    #[must_use]
    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    /// Frozen order lines.
    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Shipping address copied at order time.
    #[must_use]
    pub const fn shipping_address(&self) -> &AddressDetails {
        &self.shipping_address
    }

    /// Payment method.
    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    /// Money breakdown.
    #[must_use]
    pub const fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    /// Current status (server-driven).
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Current payment status (server-driven).
    #[must_use]
    pub const fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Gateway checkout session for one order, handed to the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    /// The gateway's order reference; the widget's opaque session token.
    pub gateway_order_id: String,
    /// Amount in paise.
    pub amount: i64,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Public widget key, when the backend supplies one.
    #[serde(default)]
    pub key: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Fields the payment widget reports on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    /// Gateway order reference the payment belongs to.
    pub gateway_order_id: String,
    /// Gateway payment reference.
    pub gateway_payment_id: String,
    /// Gateway signature over the two references.
    pub signature: String,
}

/// Payment verification request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    /// Our order.
    pub order_id: OrderId,
    /// What the widget reported.
    #[serde(flatten)]
    pub confirmation: PaymentConfirmation,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserializes_backend_shape() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "_id": "o1",
            "orderNumber": "ORD-1001",
            "items": [{
                "product": "p1", "name": "Linen shirt", "price": 500,
                "quantity": 2, "size": "M", "color": ""
            }],
            "shippingAddress": {
                "name": "Asha Rao", "phone": "9876543210", "line1": "12 MG Road",
                "city": "Bengaluru", "state": "Karnataka", "pincode": "560001"
            },
            "paymentMethod": "cod",
            "subtotal": 1000, "shippingCost": 0, "taxAmount": 180, "totalAmount": 1180,
            "orderStatus": "processing",
            "createdAt": "2026-01-15T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.id().as_str(), "o1");
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.totals().total_amount, Price::from_major(1180));
        assert_eq!(order.totals().payment_fee, Price::ZERO);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.items()[0].line_total(), Price::from_major(1000));
    }

    #[test]
    fn test_verify_request_is_flat() {
        let body = serde_json::to_value(VerifyPaymentRequest {
            order_id: OrderId::new("o1"),
            confirmation: PaymentConfirmation {
                gateway_order_id: "gw_1".to_string(),
                gateway_payment_id: "pay_1".to_string(),
                signature: "sig".to_string(),
            },
        })
        .unwrap();

        assert_eq!(body["orderId"], "o1");
        assert_eq!(body["gatewayPaymentId"], "pay_1");
    }
}
