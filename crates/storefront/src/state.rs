//! Storefront state shared across a front-end.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::account::AccountStore;
use crate::api::{ApiClient, ApiError, ClientEvent};
use crate::cart::{CartError, CartStore, LineOptions};
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::loading::LoadingIndicator;
use crate::models::{ProductPage, ProductQuery, ProductSnapshot};
use crate::notifications::NotificationStore;
use crate::session::{Session, SessionState};
use crate::storage::{FileStorage, Storage, StorageError};

/// Number of products fetched for the landing page during bootstrap.
const FEATURED_LIMIT: u32 = 12;

/// Error creating the storefront.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("API client error: {0}")]
    Api(#[from] ApiError),
}

/// What startup found.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    /// Whether a previous session was still valid.
    pub authenticated: bool,
    /// First page of products, if it could be loaded.
    pub featured: Option<ProductPage>,
}

/// The storefront: every store wired to one API client.
///
/// This struct is cheaply cloneable via `Arc`; clones share all state.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    cart: CartStore,
    account: AccountStore,
    notifications: NotificationStore,
}

impl Storefront {
    /// Create a storefront persisting to `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the API
    /// client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StartupError> {
        let storage = Arc::new(FileStorage::new(&config.data_dir)?);
        Self::with_storage(config, storage)
    }

    /// Create a storefront over an explicit storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn with_storage(
        config: StorefrontConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, StartupError> {
        let session = SessionState::load(storage.clone());
        let api = ApiClient::new(
            config.api_url.clone(),
            config.request_timeout,
            session,
            LoadingIndicator::new(),
        )?;
        let cart = CartStore::load(storage.clone(), config.pricing_policy());
        let account = AccountStore::new(api.clone(), cart.clone());
        let notifications = NotificationStore::load(storage);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                cart,
                account,
                notifications,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn account(&self) -> &AccountStore {
        &self.inner.account
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationStore {
        &self.inner.notifications
    }

    #[must_use]
    pub fn loading(&self) -> &LoadingIndicator {
        self.inner.api.loading()
    }

    /// Copy of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.api.session().snapshot()
    }

    /// A checkout flow over this storefront's stores.
    #[must_use]
    pub fn checkout(&self) -> Checkout {
        Checkout::new(
            self.inner.api.clone(),
            self.inner.cart.clone(),
            self.inner.account.clone(),
            self.inner.notifications.clone(),
        )
    }

    /// Receive login-required signals from the API client.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ClientEvent> {
        self.inner.api.subscribe()
    }

    /// Add a product to the cart as the current user and record a cart
    /// notification.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LoginRequired` when signed out and
    /// `CartError::InvalidQuantity` for a zero quantity.
    pub fn add_to_cart(
        &self,
        product: &ProductSnapshot,
        quantity: u32,
        options: LineOptions,
    ) -> Result<Uuid, CartError> {
        let line_id = self
            .inner
            .cart
            .add_item(&self.session(), product, quantity, options)?;
        self.inner
            .notifications
            .cart_notification(&product.name, quantity);
        Ok(line_id)
    }

    /// Sign out and drop the persisted cart.
    pub async fn logout(&self) {
        self.inner.account.logout().await;
    }

    /// Restore the session and load the landing page concurrently.
    ///
    /// Returns `None` if `cancel` fires first; in-flight requests are
    /// dropped.
    #[instrument(skip(self, cancel))]
    pub async fn bootstrap(&self, cancel: CancellationToken) -> Option<BootstrapReport> {
        let featured_query = ProductQuery {
            page: Some(1),
            limit: Some(FEATURED_LIMIT),
            ..ProductQuery::default()
        };
        let work = async {
            tokio::join!(
                self.inner.account.check_auth(),
                self.inner.api.products(&featured_query),
            )
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Bootstrap cancelled");
                None
            }
            (authenticated, featured) = work => {
                let featured = featured
                    .inspect_err(|e| warn!(error = %e, "Failed to load featured products"))
                    .ok();
                info!(authenticated, "Storefront ready");
                Some(BootstrapReport {
                    authenticated,
                    featured,
                })
            }
        }
    }

    /// Run [`Storefront::bootstrap`] on a background task.
    #[must_use]
    pub fn spawn_bootstrap(&self, cancel: CancellationToken) -> JoinHandle<Option<BootstrapReport>> {
        let storefront = self.clone();
        tokio::spawn(async move { storefront.bootstrap(cancel).await })
    }

    /// Drop account data whenever the API client ends the session.
    ///
    /// The task runs until `cancel` fires or the client is dropped.
    #[must_use]
    pub fn spawn_session_watcher(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut events = self.subscribe();
        let account = self.inner.account.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(ClientEvent::LoginRequired) => {
                            debug!("Session ended, dropping account data");
                            account.clear_account_data();
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Session watcher lagged");
                            account.clear_account_data();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("authenticated", &self.inner.account.is_authenticated())
            .field("cart", &self.inner.cart)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::catalog::tests::sample_product;
    use crate::session::tests::sample_user;
    use crate::storage::MemoryStorage;

    fn config() -> StorefrontConfig {
        StorefrontConfig::from_vars(|key| {
            (key == "BAZAAR_API_URL").then(|| "http://127.0.0.1:9/api/".to_string())
        })
        .unwrap()
    }

    fn storefront() -> (Storefront, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (
            Storefront::with_storage(config(), storage.clone()).unwrap(),
            storage,
        )
    }

    #[test]
    fn test_add_to_cart_requires_login() {
        let (storefront, _) = storefront();
        let product = sample_product("p1", 500).snapshot();

        let err = storefront
            .add_to_cart(&product, 1, LineOptions::default())
            .unwrap_err();
        assert_eq!(err, CartError::LoginRequired);
        assert!(storefront.cart().is_empty());
        assert!(storefront.notifications().is_empty());
    }

    #[test]
    fn test_add_to_cart_notifies() {
        let (storefront, _) = storefront();
        storefront.api().session().set_user(sample_user());
        let product = sample_product("p1", 500).snapshot();

        storefront
            .add_to_cart(&product, 2, LineOptions::new("M", "Blue"))
            .unwrap();

        assert_eq!(storefront.cart().item_count(), 2);
        let notifications = storefront.notifications().list();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Added to Cart");
    }

    #[test]
    fn test_state_survives_restart() {
        let (storefront, storage) = storefront();
        storefront.api().session().set_user(sample_user());
        storefront
            .add_to_cart(&sample_product("p1", 500).snapshot(), 1, LineOptions::default())
            .unwrap();

        let restarted = Storefront::with_storage(config(), storage).unwrap();
        assert!(restarted.session().is_authenticated());
        assert_eq!(restarted.cart().item_count(), 1);
        assert_eq!(restarted.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_cancelled_before_start() {
        let (storefront, _) = storefront();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(storefront.bootstrap(cancel).await.is_none());
    }
}
