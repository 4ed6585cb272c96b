//! Order placement and payment handoff.
//!
//! Checkout reads the cart and the account, talks to the backend, and only
//! takes the ordered lines out of the cart once an order is confirmed:
//! immediately for cash on delivery, after a verified widget payment for
//! online orders. Lines added after the order was built stay in the cart.
//! Every failure leaves the cart as it was.

use bazaar_core::{AddressId, OrderId, OrderStatus, PaymentMethod, Price};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::account::AccountStore;
use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::models::{
    CreateOrderRequest, Order, OrderItem, PaymentConfirmation, PaymentSession, VerifyPaymentRequest,
};
use crate::notifications::NotificationStore;

/// Checkout failures.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A precondition failed; nothing was sent.
    #[error("{0}")]
    Validation(String),

    #[error("login required to check out")]
    LoginRequired,

    /// The backend did not accept the order.
    #[error("Order creation failed: {0}")]
    OrderFailed(ApiError),

    /// The order exists but no payment session could be opened.
    #[error("Payment setup failed for order {order_id}: {source}")]
    PaymentSetup { order_id: OrderId, source: ApiError },

    /// The payment widget reported a failure.
    #[error("Payment failed for order {order_id}: {reason}")]
    Payment { order_id: OrderId, reason: String },

    /// The shopper closed the payment widget.
    #[error("Payment cancelled for order {order_id}")]
    PaymentCancelled { order_id: OrderId },

    /// The backend could not verify a reported payment.
    #[error("Payment verification failed for order {order_id}: {source}")]
    PaymentVerification { order_id: OrderId, source: ApiError },
}

impl CheckoutError {
    /// A message that is safe and actionable to show to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::LoginRequired => "Please log in to place your order.".to_string(),
            Self::OrderFailed(err) => err.user_message(),
            Self::PaymentSetup { .. } => {
                "Your order was created but payment could not be started. You can retry the payment from your orders.".to_string()
            }
            Self::Payment { reason, .. } => {
                format!("Payment failed: {reason}. Your cart has been kept so you can try again.")
            }
            Self::PaymentCancelled { .. } => {
                "Payment was cancelled. Your cart has been kept so you can try again.".to_string()
            }
            Self::PaymentVerification { order_id, .. } => format!(
                "We couldn't verify your payment. If you were charged, contact support with order {order_id}."
            ),
        }
    }
}

/// What the shopper chose at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Address-book entry to ship to.
    pub address_id: Option<AddressId>,
    pub payment_method: PaymentMethod,
}

/// A confirmed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Price,
}

impl From<&Order> for OrderConfirmation {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id().clone(),
            order_number: order.order_number().to_string(),
            status: order.status(),
            total: order.totals().total_amount,
        }
    }
}

impl OrderConfirmation {
    /// Report the order with `status` instead of the backend's value.
    #[must_use]
    pub const fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }
}

/// An online order waiting for the payment widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    pub order: Order,
    /// Hand this to the payment widget.
    pub session: PaymentSession,
    /// Cart lines this checkout placed, removed from the cart once paid.
    /// Empty for a resumed payment, which owns nothing in the current cart.
    pub items: Vec<OrderItem>,
}

/// Result of [`Checkout::place_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Cash on delivery: confirmed, ordered lines taken out of the cart.
    Confirmed(OrderConfirmation),
    /// Online: open the widget, then call [`Checkout::complete_payment`].
    AwaitingPayment(PendingPayment),
}

/// What the payment widget reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetResult {
    Success(PaymentConfirmation),
    Failed { reason: String },
    Dismissed,
}

/// Checkout flow over shared store handles.
#[derive(Debug, Clone)]
pub struct Checkout {
    api: ApiClient,
    cart: CartStore,
    account: AccountStore,
    notifications: NotificationStore,
}

impl Checkout {
    #[must_use]
    pub fn new(
        api: ApiClient,
        cart: CartStore,
        account: AccountStore,
        notifications: NotificationStore,
    ) -> Self {
        Self {
            api,
            cart,
            account,
            notifications,
        }
    }

    fn build_order(&self, request: &CheckoutRequest) -> Result<CreateOrderRequest, CheckoutError> {
        if self.cart.is_empty() {
            return Err(CheckoutError::Validation("Your cart is empty.".to_string()));
        }
        let Some(address_id) = &request.address_id else {
            return Err(CheckoutError::Validation(
                "Please select a shipping address.".to_string(),
            ));
        };
        if !self.account.is_authenticated() {
            return Err(CheckoutError::LoginRequired);
        }
        let address = self.account.address(address_id).ok_or_else(|| {
            CheckoutError::Validation("The selected address is no longer available.".to_string())
        })?;

        let validation = self.cart.validate();
        if !validation.is_valid {
            let problems = validation
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CheckoutError::Validation(format!(
                "Please review your cart: {problems}."
            )));
        }

        Ok(CreateOrderRequest {
            items: self.cart.order_items(),
            shipping_address: address.details,
            payment_method: request.payment_method,
            totals: self.cart.totals(request.payment_method),
        })
    }

    /// Place an order for the current cart.
    ///
    /// Preconditions are checked before anything is sent. Cash-on-delivery
    /// orders are reported as confirmed whatever status the backend assigns,
    /// and the ordered lines leave the cart. Online orders come back
    /// as [`CheckoutOutcome::AwaitingPayment`] with the cart untouched.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` or `CheckoutError::LoginRequired`
    /// without a network call, `CheckoutError::OrderFailed` if the backend
    /// rejects the order, and `CheckoutError::PaymentSetup` if an online
    /// order was created but no payment session could be opened.
    #[instrument(skip(self), fields(method = %request.payment_method))]
    pub async fn place_order(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let body = self.build_order(request)?;
        let items = body.items.clone();
        let order = self
            .api
            .create_order(&body)
            .await
            .map_err(CheckoutError::OrderFailed)?;
        info!(order_id = %order.id(), total = %order.totals().total_amount, "Order created");

        match request.payment_method {
            PaymentMethod::Cod => Ok(CheckoutOutcome::Confirmed(self.confirm(
                &order,
                OrderStatus::Confirmed,
                &items,
            ))),
            PaymentMethod::Online => {
                let session = self
                    .api
                    .create_payment_session(order.id())
                    .await
                    .map_err(|source| CheckoutError::PaymentSetup {
                        order_id: order.id().clone(),
                        source,
                    })?;
                Ok(CheckoutOutcome::AwaitingPayment(PendingPayment {
                    order,
                    session,
                    items,
                }))
            }
        }
    }

    /// Open a new payment session for an unpaid online order.
    ///
    /// The returned payment owns no cart lines, so paying it leaves the
    /// current cart unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::PaymentSetup` if the order cannot be loaded or
    /// the gateway session cannot be created.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn resume_payment(&self, order_id: &OrderId) -> Result<PendingPayment, CheckoutError> {
        let setup = |source| CheckoutError::PaymentSetup {
            order_id: order_id.clone(),
            source,
        };
        let order = self.api.order(order_id).await.map_err(setup)?;
        let session = self
            .api
            .create_payment_session(order_id)
            .await
            .map_err(setup)?;
        Ok(PendingPayment {
            order,
            session,
            items: Vec::new(),
        })
    }

    /// Settle an online order with the payment widget's result.
    ///
    /// Only a verified success touches the cart, and then only to take out
    /// the lines recorded in `pending.items`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payment` for a failed or mismatched payment,
    /// `CheckoutError::PaymentCancelled` when the widget was dismissed and
    /// `CheckoutError::PaymentVerification` when the backend rejects the
    /// reported payment.
    #[instrument(skip(self, pending, result), fields(order_id = %pending.order.id()))]
    pub async fn complete_payment(
        &self,
        pending: PendingPayment,
        result: WidgetResult,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let order_id = pending.order.id().clone();

        let confirmation = match result {
            WidgetResult::Success(confirmation) => confirmation,
            WidgetResult::Failed { reason } => {
                warn!(reason = %reason, "Payment widget reported failure");
                return Err(CheckoutError::Payment { order_id, reason });
            }
            WidgetResult::Dismissed => {
                info!("Payment widget dismissed");
                return Err(CheckoutError::PaymentCancelled { order_id });
            }
        };

        if confirmation.gateway_order_id != pending.session.gateway_order_id {
            warn!(
                expected = %pending.session.gateway_order_id,
                got = %confirmation.gateway_order_id,
                "Payment belongs to a different gateway order"
            );
            return Err(CheckoutError::Payment {
                order_id,
                reason: "the payment does not match this order".to_string(),
            });
        }

        let verified = self
            .api
            .verify_payment(&VerifyPaymentRequest {
                order_id: order_id.clone(),
                confirmation,
            })
            .await
            .map_err(|source| CheckoutError::PaymentVerification {
                order_id: order_id.clone(),
                source,
            })?;

        Ok(self.confirm(&verified, verified.status(), &pending.items))
    }

    fn confirm(&self, order: &Order, status: OrderStatus, items: &[OrderItem]) -> OrderConfirmation {
        self.cart.remove_ordered(items);
        self.notifications
            .order_notification(order.id(), status, order.totals().total_amount);
        info!(order_id = %order.id(), %status, "Order confirmed");
        OrderConfirmation::from(order).with_status(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::cart::LineOptions;
    use crate::loading::LoadingIndicator;
    use crate::models::catalog::tests::sample_product;
    use crate::pricing::PricingPolicy;
    use crate::session::tests::sample_user;
    use crate::session::SessionState;
    use crate::storage::MemoryStorage;

    // Nothing listens on the discard port; every test below must fail
    // before sending.
    fn offline_checkout() -> (Checkout, CartStore, SessionState) {
        let storage = Arc::new(MemoryStorage::new());
        let session = SessionState::load(storage.clone());
        let api = ApiClient::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
            Duration::from_millis(200),
            session.clone(),
            LoadingIndicator::new(),
        )
        .unwrap();
        let cart = CartStore::load(storage.clone(), PricingPolicy::default());
        let account = AccountStore::new(api.clone(), cart.clone());
        let notifications = NotificationStore::load(storage);
        (
            Checkout::new(api, cart.clone(), account, notifications),
            cart,
            session,
        )
    }

    fn cod(address: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            address_id: address.map(AddressId::new),
            payment_method: PaymentMethod::Cod,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_is_blocked() {
        let (checkout, _, _) = offline_checkout();
        let err = checkout.place_order(&cod(Some("a1"))).await.unwrap_err();
        assert_eq!(err.user_message(), "Your cart is empty.");
    }

    #[tokio::test]
    async fn test_missing_address_is_blocked_and_cart_kept() {
        let (checkout, cart, session) = offline_checkout();
        session.set_user(sample_user());
        cart.add_item(
            &session.snapshot(),
            &sample_product("p1", 500).snapshot(),
            1,
            LineOptions::default(),
        )
        .unwrap();

        let err = checkout.place_order(&cod(None)).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(err.user_message(), "Please select a shipping address.");

        let err = checkout.place_order(&cod(Some("gone"))).await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "The selected address is no longer available."
        );
        assert_eq!(cart.item_count(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_checkout_needs_login() {
        let (checkout, cart, session) = offline_checkout();
        session.set_user(sample_user());
        cart.add_item(
            &session.snapshot(),
            &sample_product("p1", 500).snapshot(),
            1,
            LineOptions::default(),
        )
        .unwrap();
        session.clear();

        let err = checkout.place_order(&cod(Some("a1"))).await.unwrap_err();
        assert!(matches!(err, CheckoutError::LoginRequired));
    }

    #[test]
    fn test_payment_errors_keep_the_cart_message() {
        let err = CheckoutError::PaymentCancelled {
            order_id: OrderId::new("o1"),
        };
        assert!(err.user_message().contains("Your cart has been kept"));

        let err = CheckoutError::Payment {
            order_id: OrderId::new("o1"),
            reason: "card declined".to_string(),
        };
        assert_eq!(
            err.user_message(),
            "Payment failed: card declined. Your cart has been kept so you can try again."
        );
    }
}
