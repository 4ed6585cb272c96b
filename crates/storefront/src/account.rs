//! The signed-in user and everything that hangs off them.
//!
//! `AccountStore` mediates login and logout and keeps the address book,
//! order history and wishlist in memory. None of these collections are
//! persisted; they are reloaded after every authentication change.

use std::sync::Arc;

use bazaar_core::{AddressId, Email, OrderId, Phone, ProductId};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::error::FieldErrors;
use crate::models::{Address, AddressInput, Order, PendingVerification, Product, Registration, User};
use crate::session::Session;

/// Minimum password length accepted at registration and reset.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of the emailed one-time password.
pub const OTP_LENGTH: usize = 6;

/// Account and session errors.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Input failed client-side validation; nothing was sent.
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The action needs a signed-in user.
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Address not found: {0}")]
    AddressNotFound(AddressId),
}

impl AccountError {
    fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }

    /// Field-keyed messages from client or backend validation.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Api(err) => err.field_errors(),
            Self::NotAuthenticated | Self::AddressNotFound(_) => None,
        }
    }

    /// A message that is safe and actionable to show to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Please correct the highlighted fields.".to_string(),
            Self::Api(err) => err.user_message(),
            Self::NotAuthenticated => "Please log in to continue.".to_string(),
            Self::AddressNotFound(_) => "That address no longer exists.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AccountData {
    addresses: Vec<Address>,
    orders: Vec<Order>,
    wishlist: Vec<Product>,
}

/// Handle to the account state. Clones share the same state.
#[derive(Clone)]
pub struct AccountStore {
    inner: Arc<AccountInner>,
}

struct AccountInner {
    api: ApiClient,
    cart: CartStore,
    data: RwLock<AccountData>,
}

impl AccountStore {
    /// Create a store over `api`'s session. `cart` is purged on logout.
    #[must_use]
    pub fn new(api: ApiClient, cart: CartStore) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                api,
                cart,
                data: RwLock::new(AccountData::default()),
            }),
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Copy of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.api.session().snapshot()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.api.session().user()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.api.session().is_authenticated()
    }

    fn require_auth(&self) -> Result<(), AccountError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AccountError::NotAuthenticated)
        }
    }

    /// Sign in, then load addresses, orders and wishlist.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a malformed email or empty
    /// password, or the backend's rejection. Failures of the follow-up loads
    /// are logged, not returned.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, AccountError> {
        let email = Email::parse(email).map_err(|e| AccountError::field("email", e.to_string()))?;
        if password.expose_secret().is_empty() {
            return Err(AccountError::field("password", "password is required"));
        }

        let user = self.inner.api.login(&email, password).await?;
        self.sign_in(user.clone()).await;
        Ok(user)
    }

    /// Start a registration. The returned value is needed to verify the OTP.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` listing every invalid field, or the
    /// backend's rejection.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<PendingVerification, AccountError> {
        let mut errors = FieldErrors::new();
        if registration.name.trim().is_empty() {
            errors.add("name", "name is required");
        }
        let email = Email::parse(&registration.email);
        if let Err(e) = &email {
            errors.add("email", e.to_string());
        }
        if let Err(e) = Phone::parse(&registration.phone) {
            errors.add("phone", e.to_string());
        }
        if let Err(message) = check_password(&registration.password) {
            errors.add("password", message);
        }
        errors.into_result().map_err(AccountError::Validation)?;

        let email = email.map_err(|e| AccountError::field("email", e.to_string()))?;
        let normalized = Registration {
            email: email.to_string(),
            ..registration.clone()
        };
        self.inner.api.register(&normalized).await?;
        info!("Registration pending OTP verification");
        Ok(PendingVerification { email })
    }

    /// Finish a registration with the emailed code. Signs the user in.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a malformed code, or the
    /// backend's rejection.
    #[instrument(skip(self, otp), fields(email = %pending.email))]
    pub async fn verify_otp(
        &self,
        pending: &PendingVerification,
        otp: &str,
    ) -> Result<User, AccountError> {
        let otp = otp.trim();
        if otp.len() != OTP_LENGTH || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(AccountError::field(
                "otp",
                format!("code must be {OTP_LENGTH} digits"),
            ));
        }

        let user = self.inner.api.verify_otp(&pending.email, otp).await?;
        self.sign_in(user.clone()).await;
        Ok(user)
    }

    /// Send a new code for a pending registration.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection.
    pub async fn resend_otp(&self, pending: &PendingVerification) -> Result<(), AccountError> {
        Ok(self.inner.api.resend_otp(&pending.email).await?)
    }

    /// Request a password reset email.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a malformed email, or the
    /// backend's rejection.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AccountError> {
        let email = Email::parse(email).map_err(|e| AccountError::field("email", e.to_string()))?;
        Ok(self.inner.api.forgot_password(&email).await?)
    }

    /// Set a new password from a reset link token.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a weak password, or the
    /// backend's rejection.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &SecretString,
    ) -> Result<(), AccountError> {
        check_password(password).map_err(|m| AccountError::field("password", m))?;
        Ok(self.inner.api.reset_password(token, password).await?)
    }

    /// Sign out everywhere.
    ///
    /// The backend call is best effort. Local state is cleared regardless:
    /// the session, every account collection and the persisted cart.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.inner.api.logout().await {
            warn!(error = %e, "Backend logout failed, clearing local session anyway");
        }
        self.clear_local();
        self.inner.cart.purge();
        info!("Logged out");
    }

    /// Ask the backend whether the session is still live, at startup.
    ///
    /// A valid session is restored with its account data; anything else
    /// clears local session state. Returns whether the user is signed in.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> bool {
        match self.inner.api.current_user(true).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Session is valid");
                self.sign_in(user).await;
                true
            }
            Err(e) => {
                debug!(error = %e, "No valid session");
                self.clear_local();
                false
            }
        }
    }

    async fn sign_in(&self, user: User) {
        self.inner.api.session().set_user(user);
        self.load_user_data().await;
    }

    fn clear_local(&self) {
        self.inner.api.session().clear();
        self.clear_account_data();
    }

    /// Drop the in-memory addresses, orders and wishlist.
    ///
    /// Used when the session ends underneath the store, for example after a
    /// failed refresh.
    pub fn clear_account_data(&self) {
        *self.inner.data.write() = AccountData::default();
    }

    /// Reload addresses, orders and wishlist concurrently. Each failure is
    /// logged on its own and leaves that collection unchanged.
    pub async fn load_user_data(&self) {
        let api = &self.inner.api;
        let (addresses, orders, wishlist) =
            tokio::join!(api.addresses(), api.my_orders(), api.wishlist());

        if !self.is_authenticated() {
            debug!("Session ended while loading account data");
            return;
        }

        let mut data = self.inner.data.write();
        match addresses {
            Ok(addresses) => data.addresses = addresses,
            Err(e) => warn!(error = %e, "Failed to load addresses"),
        }
        match orders {
            Ok(orders) => data.orders = orders,
            Err(e) => warn!(error = %e, "Failed to load orders"),
        }
        match wishlist {
            Ok(wishlist) => data.wishlist = wishlist,
            Err(e) => warn!(error = %e, "Failed to load wishlist"),
        }
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.inner.data.read().addresses.clone()
    }

    #[must_use]
    pub fn address(&self, id: &AddressId) -> Option<Address> {
        self.inner
            .data
            .read()
            .addresses
            .iter()
            .find(|a| &a.id == id)
            .cloned()
    }

    /// The default shipping address, or the first one if none is marked.
    #[must_use]
    pub fn default_address(&self) -> Option<Address> {
        let data = self.inner.data.read();
        data.addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| data.addresses.first())
            .cloned()
    }

    /// Create an address and append the backend's copy locally.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated`, `AccountError::Validation`,
    /// or the backend's rejection.
    #[instrument(skip(self, input))]
    pub async fn add_address(&self, input: AddressInput) -> Result<Address, AccountError> {
        self.require_auth()?;
        input.details.validate().map_err(AccountError::Validation)?;

        let created = self.inner.api.add_address(&input).await?;
        let mut data = self.inner.data.write();
        if created.is_default {
            clear_default(&mut data.addresses);
        }
        data.addresses.push(created.clone());
        Ok(created)
    }

    /// Replace an address and swap in the backend's copy locally.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated`, `AccountError::Validation`,
    /// or the backend's rejection.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        id: &AddressId,
        input: AddressInput,
    ) -> Result<Address, AccountError> {
        self.require_auth()?;
        input.details.validate().map_err(AccountError::Validation)?;

        let updated = self.inner.api.update_address(id, &input).await?;
        let mut data = self.inner.data.write();
        if updated.is_default {
            clear_default(&mut data.addresses);
        }
        match data.addresses.iter_mut().find(|a| a.id == updated.id) {
            Some(existing) => *existing = updated.clone(),
            None => data.addresses.push(updated.clone()),
        }
        Ok(updated)
    }

    /// Delete an address and drop it locally.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: &AddressId) -> Result<(), AccountError> {
        self.require_auth()?;
        self.inner.api.delete_address(id).await?;
        self.inner.data.write().addresses.retain(|a| &a.id != id);
        Ok(())
    }

    /// Make an existing address the default.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::AddressNotFound` if the address is not in the
    /// local address book, or the backend's rejection.
    pub async fn set_default_address(&self, id: &AddressId) -> Result<Address, AccountError> {
        let address = self
            .address(id)
            .ok_or_else(|| AccountError::AddressNotFound(id.clone()))?;
        let input = AddressInput {
            is_default: true,
            ..AddressInput::from(address)
        };
        self.update_address(id, input).await
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    #[must_use]
    pub fn wishlist(&self) -> Vec<Product> {
        self.inner.data.read().wishlist.clone()
    }

    #[must_use]
    pub fn is_in_wishlist(&self, product: &ProductId) -> bool {
        self.inner
            .data
            .read()
            .wishlist
            .iter()
            .any(|p| &p.id == product)
    }

    /// Add a product, then reload the whole wishlist.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn add_to_wishlist(&self, product: &ProductId) -> Result<(), AccountError> {
        self.require_auth()?;
        self.inner.api.add_to_wishlist(product).await?;
        let wishlist = self.inner.api.wishlist().await?;
        self.inner.data.write().wishlist = wishlist;
        Ok(())
    }

    /// Remove a product. The local list changes only after the backend
    /// confirms.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn remove_from_wishlist(&self, product: &ProductId) -> Result<(), AccountError> {
        self.require_auth()?;
        self.inner.api.remove_from_wishlist(product).await?;
        self.inner
            .data
            .write()
            .wishlist
            .retain(|p| &p.id != product);
        Ok(())
    }

    /// Add or remove a product. Returns whether it is now on the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    pub async fn toggle_wishlist(&self, product: &ProductId) -> Result<bool, AccountError> {
        if self.is_in_wishlist(product) {
            self.remove_from_wishlist(product).await?;
            Ok(false)
        } else {
            self.add_to_wishlist(product).await?;
            Ok(true)
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Order history as last loaded.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.inner.data.read().orders.clone()
    }

    /// Reload the order history.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    pub async fn refresh_orders(&self) -> Result<Vec<Order>, AccountError> {
        self.require_auth()?;
        let orders = self.inner.api.my_orders().await?;
        self.inner.data.write().orders.clone_from(&orders);
        Ok(orders)
    }

    /// Fetch one order's current state.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotAuthenticated` or the backend's rejection.
    pub async fn order(&self, id: &OrderId) -> Result<Order, AccountError> {
        self.require_auth()?;
        Ok(self.inner.api.order(id).await?)
    }
}

impl std::fmt::Debug for AccountStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.data.read();
        f.debug_struct("AccountStore")
            .field("session", &self.inner.api.session())
            .field("addresses", &data.addresses.len())
            .field("orders", &data.orders.len())
            .field("wishlist", &data.wishlist.len())
            .finish()
    }
}

fn clear_default(addresses: &mut [Address]) {
    for address in addresses {
        address.is_default = false;
    }
}

fn check_password(password: &SecretString) -> Result<(), String> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        Err(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::loading::LoadingIndicator;
    use crate::models::address::tests::sample_details;
    use crate::pricing::PricingPolicy;
    use crate::session::SessionState;
    use crate::storage::MemoryStorage;

    // Nothing listens here; every test below must fail before sending.
    fn offline_store() -> AccountStore {
        let storage = Arc::new(MemoryStorage::new());
        let api = ApiClient::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
            Duration::from_millis(200),
            SessionState::load(storage.clone()),
            LoadingIndicator::new(),
        )
        .unwrap();
        AccountStore::new(api, CartStore::load(storage, PricingPolicy::default()))
    }

    #[tokio::test]
    async fn test_login_validates_before_sending() {
        let store = offline_store();

        let err = store
            .login("not-an-email", &SecretString::from("hunter22"))
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().get("email").is_some());

        let err = store
            .login("asha@example.com", &SecretString::from(""))
            .await
            .unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("password"),
            Some("password is required")
        );
    }

    #[tokio::test]
    async fn test_register_reports_every_invalid_field() {
        let store = offline_store();
        let registration = Registration {
            name: String::new(),
            email: "asha@".to_string(),
            phone: "12".to_string(),
            password: SecretString::from("short"),
        };

        let err = store.register(&registration).await.unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.len(), 4);
        assert_eq!(
            errors.get("password"),
            Some("password must be at least 8 characters")
        );
    }

    #[tokio::test]
    async fn test_otp_must_be_six_digits() {
        let store = offline_store();
        let pending = PendingVerification {
            email: Email::parse("asha@example.com").unwrap(),
        };

        let err = store.verify_otp(&pending, "12ab56").await.unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("otp"),
            Some("code must be 6 digits")
        );
    }

    #[tokio::test]
    async fn test_address_changes_need_a_session() {
        let store = offline_store();
        let input = AddressInput {
            details: sample_details(),
            is_default: true,
        };

        assert!(matches!(
            store.add_address(input).await,
            Err(AccountError::NotAuthenticated)
        ));
        assert!(matches!(
            store.set_default_address(&AddressId::new("a1")).await,
            Err(AccountError::AddressNotFound(_))
        ));
        assert_eq!(
            AccountError::NotAuthenticated.user_message(),
            "Please log in to continue."
        );
    }
}
