//! Authentication, address book and wishlist endpoints.

use bazaar_core::{AddressId, Email, ProductId};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::models::{Address, AddressInput, Product, Registration, User};

impl ApiClient {
    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<User, ApiError> {
        let body = json!({ "email": email, "password": password.expose_secret() });
        self.fetch(ApiRequest::post("auth/login").json(&body)?).await
    }

    /// Create an account. The backend emails a one-time password.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the registration.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let body = json!({
            "name": registration.name,
            "email": registration.email,
            "phone": registration.phone,
            "password": registration.password.expose_secret(),
        });
        self.call(ApiRequest::post("auth/register").json(&body)?).await
    }

    /// Confirm a registration with the emailed one-time password.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is wrong or expired.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_otp(&self, email: &Email, otp: &str) -> Result<User, ApiError> {
        let body = json!({ "email": email, "otp": otp });
        self.fetch(ApiRequest::post("auth/verify-otp").json(&body)?).await
    }

    /// Send a new one-time password.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resend_otp(&self, email: &Email) -> Result<(), ApiError> {
        let body = json!({ "email": email });
        self.call(ApiRequest::post("auth/resend-otp").json(&body)?).await
    }

    /// Invalidate the session on the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.call(ApiRequest::post("auth/logout").quiet()).await
    }

    /// The signed-in user.
    ///
    /// A `quiet` check ends an invalid session without signalling
    /// [`ClientEvent::LoginRequired`](super::ClientEvent::LoginRequired).
    ///
    /// # Errors
    ///
    /// Returns an error if there is no valid session.
    #[instrument(skip(self))]
    pub async fn current_user(&self, quiet: bool) -> Result<User, ApiError> {
        let request = ApiRequest::get("auth/me");
        self.fetch(if quiet { request.quiet() } else { request })
            .await
    }

    /// Email a password reset link.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn forgot_password(&self, email: &Email) -> Result<(), ApiError> {
        let body = json!({ "email": email });
        self.call(ApiRequest::post("auth/forgot-password").json(&body)?)
            .await
    }

    /// Set a new password using the token from the reset link.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, password: &SecretString) -> Result<(), ApiError> {
        let body = json!({ "password": password.expose_secret() });
        self.call(
            ApiRequest::post("auth/reset-password")
                .segment(token)
                .json(&body)?,
        )
        .await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// The user's address book.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<Address>, ApiError> {
        self.fetch(ApiRequest::get("auth/addresses")).await
    }

    /// Create an address. Returns it with its backend ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip(self, input))]
    pub async fn add_address(&self, input: &AddressInput) -> Result<Address, ApiError> {
        self.fetch(ApiRequest::post("auth/addresses").json(input)?)
            .await
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not exist or is rejected.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        id: &AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        self.fetch(
            ApiRequest::put("auth/addresses")
                .segment(id.as_str())
                .json(input)?,
        )
        .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: &AddressId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete("auth/addresses").segment(id.as_str()))
            .await
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Products on the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn wishlist(&self) -> Result<Vec<Product>, ApiError> {
        self.fetch(ApiRequest::get("auth/wishlist")).await
    }

    /// Add a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn add_to_wishlist(&self, product: &ProductId) -> Result<(), ApiError> {
        self.call(ApiRequest::post("auth/wishlist").segment(product.as_str()))
            .await
    }

    /// Remove a product from the wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn remove_from_wishlist(&self, product: &ProductId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete("auth/wishlist").segment(product.as_str()))
            .await
    }
}
