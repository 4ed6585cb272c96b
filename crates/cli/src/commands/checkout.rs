//! Checkout and payment commands.
//!
//! The terminal has no payment widget, so an online order prints the gateway
//! session and waits for `pay success|fail|cancel` to report what the widget
//! would have returned.

use std::io::Write;

use bazaar_core::{AddressId, OrderId, PaymentMethod};
use bazaar_storefront::checkout::{OrderConfirmation, PendingPayment, WidgetResult};
use bazaar_storefront::models::PaymentConfirmation;
use bazaar_storefront::{CheckoutOutcome, CheckoutRequest};
use secrecy::ExposeSecret;
use tokio::io::AsyncBufRead;

use super::{CommandError, PayResult};
use crate::render;
use crate::shell::Shell;

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub(super) async fn checkout(
        &mut self,
        address: Option<AddressId>,
        payment: PaymentMethod,
    ) -> Result<(), CommandError> {
        let address_id =
            address.or_else(|| self.storefront.account().default_address().map(|a| a.id));
        let request = CheckoutRequest {
            address_id,
            payment_method: payment,
        };

        if !self.storefront.cart().is_empty() {
            for row in render::totals(&self.storefront.cart().totals(payment)) {
                self.say(row)?;
            }
        }

        match self.storefront.checkout().place_order(&request).await? {
            CheckoutOutcome::Confirmed(confirmation) => self.confirmed(&confirmation),
            CheckoutOutcome::AwaitingPayment(pending) => self.awaiting_payment(pending),
        }
    }

    pub(super) async fn resume_payment(&mut self, order_id: &OrderId) -> Result<(), CommandError> {
        let pending = self.storefront.checkout().resume_payment(order_id).await?;
        self.awaiting_payment(pending)
    }

    pub(super) async fn pay(&mut self, result: PayResult) -> Result<(), CommandError> {
        let pending = self.pending_payment.take().ok_or_else(|| {
            CommandError::Usage("There is no payment waiting. Use `checkout --payment online`.".to_string())
        })?;

        let result = match result {
            PayResult::Success {
                payment_id,
                signature,
            } => WidgetResult::Success(PaymentConfirmation {
                gateway_order_id: pending.session.gateway_order_id.clone(),
                gateway_payment_id: payment_id,
                signature,
            }),
            PayResult::Fail { reason } => WidgetResult::Failed { reason },
            PayResult::Cancel => WidgetResult::Dismissed,
        };

        let confirmation = self
            .storefront
            .checkout()
            .complete_payment(pending, result)
            .await?;
        self.confirmed(&confirmation)
    }

    fn awaiting_payment(&mut self, pending: PendingPayment) -> Result<(), CommandError> {
        let session = &pending.session;
        let key = session.key.clone().or_else(|| {
            self.storefront
                .config()
                .payment_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
        });

        self.say(format!(
            "Order #{} created. Complete payment in the widget:",
            pending.order.order_number()
        ))?;
        self.say(format!("  gateway order: {}", session.gateway_order_id))?;
        self.say(format!(
            "  amount: {}.{:02} {}",
            session.amount / 100,
            session.amount % 100,
            session.currency
        ))?;
        if let Some(key) = key {
            self.say(format!("  key: {key}"))?;
        }
        self.say("Then run: pay success --payment-id <id> --signature <sig> | pay fail | pay cancel")?;
        self.pending_payment = Some(pending);
        Ok(())
    }

    fn confirmed(&mut self, confirmation: &OrderConfirmation) -> Result<(), CommandError> {
        self.say(format!(
            "Order #{} {} for {}. Thank you!",
            confirmation.order_number, confirmation.status, confirmation.total
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::shell::tests::{offline_storefront, run_script};

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let output = run_script(offline_storefront(), "checkout\n").await;
        assert!(output.contains("Your cart is empty."));
    }

    #[tokio::test]
    async fn test_pay_without_pending_order() {
        let output = run_script(offline_storefront(), "pay cancel\n").await;
        assert!(output.contains("There is no payment waiting."));
    }
}
