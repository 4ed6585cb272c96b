//! Client for the Bazaar backend REST API.
//!
//! Uses `reqwest` 0.13 with a cookie store: the backend authenticates with
//! HTTP-only session cookies, so the client never sees a token. Catalog reads
//! are cached using `moka` (5-minute TTL).
//!
//! # Session refresh
//!
//! Every response goes through [`ApiClient::execute`]:
//!
//! - any non-401 response resets the refresh attempt counter
//! - a 401 from an auth endpoint (or from a request that was already
//!   replayed once) ends the session
//! - any other 401 refreshes the session once through the per-client
//!   [`RefreshCoordinator`] and replays the request; concurrent 401s share a
//!   single refresh call
//!
//! Ending the session clears the shared [`SessionState`] and broadcasts
//! [`ClientEvent::LoginRequired`] unless the request was marked quiet.

mod auth;
mod cache;
mod catalog;
mod orders;
pub mod refresh;
mod reviews;

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::ProductId;
use moka::future::Cache;
use reqwest::{Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::FieldErrors;
use crate::loading::LoadingIndicator;
use crate::session::SessionState;

use cache::{CacheKey, CacheValue};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshTicket};

/// Endpoints whose 401 means "bad credentials", never "expired session".
const AUTH_ENDPOINTS: &[&str] = &[
    "auth/login",
    "auth/register",
    "auth/verify-otp",
    "auth/resend-otp",
    "auth/refresh-token",
];

const REFRESH_PATH: &str = "auth/refresh-token";

/// Signals for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// The session is gone; send the shopper to the login screen.
    LoginRequired,
}

/// Structured error body returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: FieldErrors,
}

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("API error ({status}): {}", .payload.message)]
    Api {
        status: StatusCode,
        payload: ErrorPayload,
    },

    /// Request data failed client-side validation; nothing was sent.
    #[error("Invalid request: {0}")]
    Validation(FieldErrors),

    /// The session expired and could not be refreshed.
    #[error("Session refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    /// The session expired and refreshing was not allowed.
    #[error("Login required")]
    LoginRequired,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A successful response carried no data.
    #[error("Response contained no data")]
    MissingData,

    /// The configured base URL cannot take a path.
    #[error("Invalid API base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status of a backend rejection.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Field-keyed validation messages, from the backend or the client.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Api { payload, .. } if !payload.errors.is_empty() => Some(&payload.errors),
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether the failure means the shopper has to sign in.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::LoginRequired)
            || self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// A message that is safe and actionable to show to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => {
                "The request timed out. Please try again.".to_string()
            }
            Self::Http(_) => {
                "Could not reach the store. Check your connection and try again.".to_string()
            }
            Self::Api { status, payload } => {
                if !payload.message.is_empty() && !status.is_server_error() {
                    payload.message.clone()
                } else if *status == StatusCode::NOT_FOUND {
                    "We couldn't find what you were looking for.".to_string()
                } else {
                    "Something went wrong on our side. Please try again.".to_string()
                }
            }
            Self::Validation(_) => "Please correct the highlighted fields.".to_string(),
            Self::RefreshFailed(_) | Self::LoginRequired => {
                "Your session has expired. Please log in again.".to_string()
            }
            Self::RateLimited(seconds) => {
                format!("Too many requests. Please wait {seconds} seconds and try again.")
            }
            Self::Parse(_) | Self::MissingData | Self::InvalidUrl(_) => {
                "The store returned an unexpected response. Please try again later.".to_string()
            }
        }
    }

    /// Whether this failure points at a bug or an outage.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        match self {
            Self::Api { status, .. } => status.is_server_error(),
            Self::Http(e) => e.is_decode() || e.is_builder(),
            Self::Parse(_) | Self::MissingData | Self::InvalidUrl(_) => true,
            Self::Validation(_)
            | Self::RefreshFailed(_)
            | Self::LoginRequired
            | Self::RateLimited(_) => false,
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    /// Absent on some endpoints; a 2xx status then means success.
    #[serde(default)]
    success: Option<bool>,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: FieldErrors,
}

/// One backend call, replayable after a session refresh.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    path: String,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
    quiet: bool,
}

impl ApiRequest {
    fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            segments: path.split('/').map(str::to_string).collect(),
            query: Vec::new(),
            body: None,
            quiet: false,
        }
    }

    pub(crate) fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub(crate) fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub(crate) fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a dynamic path segment. Percent-encoded when the URL is built.
    pub(crate) fn segment(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self.path.push_str("/:id");
        self
    }

    /// Append a fixed path segment after a dynamic one.
    pub(crate) fn suffix(mut self, segment: &'static str) -> Self {
        self.segments.push(segment.to_string());
        self.path.push('/');
        self.path.push_str(segment);
        self
    }

    pub(crate) fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub(crate) fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Do not broadcast [`ClientEvent::LoginRequired`] if this request ends
    /// the session.
    pub(crate) const fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn is_auth_endpoint(&self) -> bool {
        AUTH_ENDPOINTS.contains(&self.path.as_str())
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Bazaar backend.
///
/// Cheap to clone; clones share the cookie jar, the session, the refresh
/// coordinator and the cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionState,
    refresh: RefreshCoordinator,
    loading: LoadingIndicator,
    events: broadcast::Sender<ClientEvent>,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` cannot take a path or the HTTP client
    /// cannot be built.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        session: SessionState,
        loading: LoadingIndicator,
    ) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .support_invalidation_closures()
            .build();

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url,
                session,
                refresh: RefreshCoordinator::new(),
                loading,
                events,
                cache,
            }),
        })
    }

    /// The session this client keeps in sync.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    #[must_use]
    pub fn loading(&self) -> &LoadingIndicator {
        &self.inner.loading
    }

    /// The refresh coordinator owned by this client.
    #[must_use]
    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Receive login-required signals.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Drop all cached catalog data.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Drop cached data that carries a product's rating: the product itself
    /// and every listing page.
    async fn invalidate_ratings(&self, product: Option<&ProductId>) {
        match product {
            Some(id) => {
                self.inner
                    .cache
                    .invalidate(&CacheKey::Product(id.clone()))
                    .await;
            }
            // Unknown product: any cached product may be stale.
            None => {
                if let Err(e) = self
                    .inner
                    .cache
                    .invalidate_entries_if(|key, _| matches!(key, CacheKey::Product(_)))
                {
                    warn!(error = %e, "Failed to invalidate cached products");
                    self.inner.cache.invalidate_all();
                    return;
                }
            }
        }
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(|key, _| matches!(key, CacheKey::Products(_)))
        {
            warn!(error = %e, "Failed to invalidate cached listings");
            self.inner.cache.invalidate_all();
        }
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.url_for(request)?;
        let _loading = self.inner.loading.begin();

        let mut builder = self.inner.client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Run a request under the session refresh policy and return the
    /// envelope's `data`.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Option<T>, ApiError> {
        let mut retried = false;

        loop {
            let response = self.send(&request).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                self.inner.refresh.reset_attempts();
                return read_envelope(response).await;
            }

            if request.is_auth_endpoint() || retried {
                let err = read_error(response).await;
                self.expire_session(request.quiet);
                return Err(err);
            }

            retried = true;
            match self.inner.refresh.begin_refresh() {
                RefreshTicket::Leader(lease) => {
                    let outcome = self.refresh_session().await;
                    let waiters = lease.resolve(&outcome);
                    debug!(waiters, ok = outcome.is_ok(), "Session refresh finished");
                    if let Err(failure) = outcome {
                        self.expire_session(request.quiet);
                        return Err(ApiError::RefreshFailed(failure));
                    }
                }
                RefreshTicket::Follower(rx) => {
                    debug!("Waiting for session refresh in flight");
                    match rx.await {
                        Ok(Ok(())) => {}
                        Ok(Err(failure)) => return Err(ApiError::RefreshFailed(failure)),
                        Err(_) => return Err(ApiError::RefreshFailed(RefreshFailure::abandoned())),
                    }
                }
                RefreshTicket::Exhausted => {
                    self.expire_session(request.quiet);
                    return Err(ApiError::LoginRequired);
                }
            }
        }
    }

    /// Run a request whose response must carry data.
    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.ok_or(ApiError::MissingData)
    }

    /// Run a request and ignore any response data.
    async fn call(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute::<IgnoredAny>(request).await.map(|_| ())
    }

    async fn refresh_session(&self) -> Result<(), RefreshFailure> {
        let request = ApiRequest::post(REFRESH_PATH);
        match self.send(&request).await {
            Ok(response) if response.status().is_success() => {
                self.inner.refresh.reset_attempts();
                Ok(())
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let err = read_error(response).await;
                warn!(status, error = %err, "Session refresh rejected");
                Err(RefreshFailure {
                    status: Some(status),
                    message: err.to_string(),
                })
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                Err(RefreshFailure {
                    status: None,
                    message: e.to_string(),
                })
            }
        }
    }

    fn expire_session(&self, quiet: bool) {
        let was_authenticated = self.inner.session.is_authenticated();
        self.inner.session.clear();
        if quiet {
            debug!(was_authenticated, "Session ended quietly");
        } else {
            warn!(was_authenticated, "Session ended, login required");
            // No receivers just means nobody is listening yet.
            let _ = self.inner.events.send(ClientEvent::LoginRequired);
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(500).collect()
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, ApiError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    let text = response.text().await?;

    if !status.is_success() {
        let err = api_error(status, &text);
        if status.is_server_error() {
            error!(status = %status, body = %truncate(&text), "Backend returned server error");
        } else {
            debug!(status = %status, error = %err, "Backend rejected request");
        }
        return Err(err);
    }

    if text.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
        error!(error = %e, body = %truncate(&text), "Failed to parse backend response");
        ApiError::Parse(e)
    })?;

    if envelope.success == Some(false) {
        return Err(ApiError::Api {
            status,
            payload: ErrorPayload {
                message: envelope.message.unwrap_or_default(),
                errors: envelope.errors,
            },
        });
    }

    Ok(envelope.data)
}

async fn read_error(response: reqwest::Response) -> ApiError {
    let status = response.status();
    match response.text().await {
        Ok(text) => api_error(status, &text),
        Err(e) => ApiError::Http(e),
    }
}

fn api_error(status: StatusCode, body: &str) -> ApiError {
    let mut payload = serde_json::from_str::<ErrorPayload>(body).unwrap_or_default();
    if payload.message.is_empty() {
        payload.message = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }
    ApiError::Api { status, payload }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{ProductPage, ProductQuery};
    use crate::storage::MemoryStorage;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            Url::parse(base).unwrap(),
            Duration::from_secs(5),
            SessionState::load(Arc::new(MemoryStorage::new())),
            LoadingIndicator::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_url_joins_segments_and_encodes_ids() {
        let with_slash = client("https://api.example.com/api/");
        let request = ApiRequest::delete("auth/addresses").segment("a/1 b");
        assert_eq!(
            with_slash.url_for(&request).unwrap().as_str(),
            "https://api.example.com/api/auth/addresses/a%2F1%20b"
        );
        assert_eq!(request.path, "auth/addresses/:id");

        let without_slash = client("https://api.example.com/api");
        let request = ApiRequest::get("products").query(vec![
            ("page", "2".to_string()),
            ("search", "linen shirt".to_string()),
        ]);
        assert_eq!(
            without_slash.url_for(&request).unwrap().as_str(),
            "https://api.example.com/api/products?page=2&search=linen+shirt"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = ApiClient::new(
            Url::parse("mailto:shop@example.com").unwrap(),
            Duration::from_secs(5),
            SessionState::load(Arc::new(MemoryStorage::new())),
            LoadingIndicator::new(),
        );
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_auth_endpoints() {
        assert!(ApiRequest::post("auth/login").is_auth_endpoint());
        assert!(ApiRequest::post("auth/refresh-token").is_auth_endpoint());
        assert!(!ApiRequest::get("auth/me").is_auth_endpoint());
        assert!(!ApiRequest::get("auth/addresses").is_auth_endpoint());
    }

    #[test]
    fn test_api_error_falls_back_to_status_reason() {
        let err = api_error(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(err.to_string(), "API error (404 Not Found): Not Found");

        let err = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"success":false,"message":"Email already registered","errors":{"email":"taken"}}"#,
        );
        assert_eq!(err.user_message(), "Email already registered");
        assert_eq!(err.field_errors().unwrap().get("email"), Some("taken"));
        assert!(!err.is_reportable());
    }

    #[test]
    fn test_server_errors_are_reported_with_generic_message() {
        let err = api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"db connection reset"}"#,
        );
        assert!(err.is_reportable());
        assert_eq!(
            err.user_message(),
            "Something went wrong on our side. Please try again."
        );
    }

    #[test]
    fn test_session_errors_ask_for_login() {
        assert!(ApiError::LoginRequired.is_unauthorized());
        assert!(ApiError::RefreshFailed(RefreshFailure::abandoned()).is_unauthorized());
        assert_eq!(
            ApiError::LoginRequired.user_message(),
            "Your session has expired. Please log in again."
        );
        assert!(!ApiError::MissingData.is_unauthorized());
    }

    async fn seed_catalog(api: &ApiClient) {
        use crate::models::catalog::tests::sample_product;

        let cache = &api.inner.cache;
        for id in ["p1", "p2"] {
            cache
                .insert(
                    CacheKey::Product(ProductId::new(id)),
                    CacheValue::Product(Box::new(sample_product(id, 500))),
                )
                .await;
        }
        let page = ProductPage {
            products: vec![sample_product("p1", 500)],
            page: 1,
            total_pages: 1,
            total: 1,
        };
        for category in [None, Some("shirts".to_string())] {
            let query = ProductQuery {
                category,
                ..ProductQuery::default()
            };
            cache
                .insert(CacheKey::Products(query), CacheValue::Products(page.clone()))
                .await;
        }
        cache.insert(CacheKey::Categories, CacheValue::Categories(Vec::new())).await;
    }

    fn cached(api: &ApiClient, key: &CacheKey) -> bool {
        api.inner.cache.contains_key(key)
    }

    #[tokio::test]
    async fn test_review_change_drops_rated_product_and_listings() {
        let api = client("https://api.example.com/api/");
        seed_catalog(&api).await;

        api.invalidate_ratings(Some(&ProductId::new("p1"))).await;
        api.inner.cache.run_pending_tasks().await;

        assert!(!cached(&api, &CacheKey::Product(ProductId::new("p1"))));
        assert!(cached(&api, &CacheKey::Product(ProductId::new("p2"))));
        assert!(!cached(&api, &CacheKey::Products(ProductQuery::default())));
        let shirts = ProductQuery {
            category: Some("shirts".to_string()),
            ..ProductQuery::default()
        };
        assert!(!cached(&api, &CacheKey::Products(shirts)));
        assert!(cached(&api, &CacheKey::Categories));
    }

    #[tokio::test]
    async fn test_deleted_review_drops_every_product() {
        let api = client("https://api.example.com/api/");
        seed_catalog(&api).await;

        api.invalidate_ratings(None).await;
        api.inner.cache.run_pending_tasks().await;

        assert!(!cached(&api, &CacheKey::Product(ProductId::new("p1"))));
        assert!(!cached(&api, &CacheKey::Product(ProductId::new("p2"))));
        assert!(!cached(&api, &CacheKey::Products(ProductQuery::default())));
        assert!(cached(&api, &CacheKey::Categories));
    }
}
