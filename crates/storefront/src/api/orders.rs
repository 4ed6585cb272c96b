//! Order and payment endpoints.

use bazaar_core::OrderId;
use serde_json::json;
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::models::{CreateOrderRequest, Order, PaymentSession, VerifyPaymentRequest};

impl ApiClient {
    /// The user's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.fetch(ApiRequest::get("orders/my-orders")).await
    }

    /// Place an order. The backend's response is the authoritative order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order.
    #[instrument(skip(self, request), fields(items = request.items.len(), method = %request.payment_method))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiError> {
        self.fetch(ApiRequest::post("orders").json(request)?).await
    }

    /// One order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.fetch(ApiRequest::get("orders").segment(id.as_str()))
            .await
    }

    /// Open a payment gateway session for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway session cannot be created.
    #[instrument(skip(self), fields(order_id = %order))]
    pub async fn create_payment_session(&self, order: &OrderId) -> Result<PaymentSession, ApiError> {
        let body = json!({ "orderId": order });
        self.fetch(ApiRequest::post("payments/create-order").json(&body)?)
            .await
    }

    /// Verify what the payment widget reported. Returns the updated order.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(&self, request: &VerifyPaymentRequest) -> Result<Order, ApiError> {
        self.fetch(ApiRequest::post("payments/verify").json(request)?)
            .await
    }
}
