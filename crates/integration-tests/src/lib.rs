//! Integration tests for the Bazaar storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! Each test starts its own [`MockBackend`]: an axum server on an ephemeral
//! localhost port speaking the backend's REST envelope, with cookie sessions
//! that the test can expire at will.
//!
//! # Test Categories
//!
//! - `session_refresh` - single-flight refresh and failure cascade
//! - `account` - login, logout, addresses and wishlist
//! - `checkout` - cash-on-delivery and online payment flows
//! - `bootstrap` - startup and cancellation

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bazaar_storefront::{MemoryStorage, Storage, Storefront, StorefrontConfig};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Password the mock accepts for [`TEST_EMAIL`].
pub const TEST_PASSWORD: &str = "correct-horse";

/// The only registered account.
pub const TEST_EMAIL: &str = "asha@example.com";

/// Registration code the mock accepts.
pub const TEST_OTP: &str = "123456";

/// Signature the mock's payment gateway accepts.
pub const VALID_SIGNATURE: &str = "valid-signature";

const SESSION_COOKIE: &str = "session";
const REFRESH_COOKIE: &str = "refresh";

// =============================================================================
// Mock backend
// =============================================================================

/// Shared state behind the mock routes.
#[derive(Debug, Default)]
pub struct MockState {
    /// Only session cookies carrying this generation are accepted.
    generation: AtomicU64,
    refresh_fails: AtomicBool,
    refresh_delay_ms: AtomicU64,
    verify_fails: AtomicBool,
    /// Status given to new orders; `confirmed` when unset.
    created_status: Mutex<Option<String>>,
    next_id: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
    data: Mutex<MockData>,
}

#[derive(Debug, Default)]
struct MockData {
    addresses: Vec<Value>,
    wishlist: Vec<String>,
    orders: Vec<Value>,
}

impl MockState {
    fn hit(&self, name: &'static str) {
        *self.calls.lock().entry(name).or_default() += 1;
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn session_cookies(&self) -> AppendHeaders<[(header::HeaderName, String); 2]> {
        let generation = self.generation.load(Ordering::SeqCst);
        AppendHeaders([
            (
                header::SET_COOKIE,
                format!("{SESSION_COOKIE}={generation}; Path=/; HttpOnly"),
            ),
            (
                header::SET_COOKIE,
                format!("{REFRESH_COOKIE}=valid; Path=/; HttpOnly"),
            ),
        ])
    }

    /// Check the session cookie, counting rejections.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let current = self.generation.load(Ordering::SeqCst).to_string();
        if cookie(headers, SESSION_COOKIE).as_deref() == Some(current.as_str()) {
            Ok(())
        } else {
            self.hit("unauthorized");
            Err(fail(StatusCode::UNAUTHORIZED, "Not authorized, token expired"))
        }
    }
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

fn ok_empty(message: &str) -> Response {
    Json(json!({ "success": true, "message": message })).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

/// The seeded user.
#[must_use]
pub fn test_user() -> Value {
    json!({
        "_id": "u1",
        "name": "Asha Rao",
        "email": TEST_EMAIL,
        "phone": "9876543210"
    })
}

/// The seeded catalog: an in-stock shirt, a tote with two left, and a
/// sold-out scarf.
#[must_use]
pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "_id": "p1", "name": "Linen shirt", "price": 500, "originalPrice": 650,
            "images": ["https://cdn.example.com/p1.jpg"], "category": "shirts",
            "sizes": ["S", "M", "L"], "colors": ["Blue"], "stock": 10,
            "rating": 4.5, "numReviews": 12
        }),
        json!({
            "_id": "p2", "name": "Canvas tote", "price": 250,
            "images": [], "category": "bags", "stock": 2, "rating": 4.0, "numReviews": 3
        }),
        json!({
            "_id": "p3", "name": "Silk scarf", "price": 900,
            "images": [], "category": "accessories", "stock": 0, "rating": 0, "numReviews": 0
        }),
    ]
}

fn find_product(id: &str) -> Option<Value> {
    catalog().into_iter().find(|p| p["_id"] == id)
}

/// A valid address body for the address book.
#[must_use]
pub fn address_body(name: &str, is_default: bool) -> Value {
    json!({
        "name": name,
        "phone": "9876543210",
        "line1": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "pincode": "560001",
        "isDefault": is_default
    })
}

type Shared = State<Arc<MockState>>;

// -- auth --------------------------------------------------------------------

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("login");
    if body["email"] == TEST_EMAIL && body["password"] == TEST_PASSWORD {
        (state.session_cookies(), ok(test_user())).into_response()
    } else {
        fail(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("register");
    if body["email"] == TEST_EMAIL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Validation failed",
                "errors": { "email": "Email is already registered" }
            })),
        )
            .into_response();
    }
    ok_empty("OTP sent to your email")
}

async fn verify_otp(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("verify-otp");
    if body["otp"] != TEST_OTP {
        return fail(StatusCode::BAD_REQUEST, "Invalid or expired OTP");
    }
    let user = json!({ "_id": "u2", "name": "New Shopper", "email": body["email"] });
    (state.session_cookies(), ok(user)).into_response()
}

async fn accepted(State(state): Shared) -> Response {
    state.hit("accepted");
    ok_empty("OK")
}

async fn refresh_token(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("refresh");
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.refresh_fails.load(Ordering::SeqCst) || cookie(&headers, REFRESH_COOKIE).is_none() {
        return fail(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }
    (state.session_cookies(), ok_empty("Token refreshed")).into_response()
}

async fn logout(State(state): Shared) -> Response {
    state.hit("logout");
    (
        AppendHeaders([
            (header::SET_COOKIE, format!("{SESSION_COOKIE}=; Path=/; Max-Age=0")),
            (header::SET_COOKIE, format!("{REFRESH_COOKIE}=; Path=/; Max-Age=0")),
        ]),
        ok_empty("Logged out"),
    )
        .into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("me");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    ok(test_user())
}

// -- addresses ---------------------------------------------------------------

async fn addresses(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("addresses");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    ok(Value::Array(state.data.lock().addresses.clone()))
}

async fn add_address(State(state): Shared, headers: HeaderMap, Json(mut body): Json<Value>) -> Response {
    state.hit("add-address");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    body["_id"] = json!(state.next_id("a"));
    let mut data = state.data.lock();
    let is_default = body["isDefault"] == true || data.addresses.is_empty();
    body["isDefault"] = json!(is_default);
    if is_default {
        for address in &mut data.addresses {
            address["isDefault"] = json!(false);
        }
    }
    data.addresses.push(body.clone());
    (StatusCode::CREATED, ok(body)).into_response()
}

async fn update_address(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    state.hit("update-address");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    let mut data = state.data.lock();
    if !data.addresses.iter().any(|a| a["_id"] == id.as_str()) {
        return fail(StatusCode::NOT_FOUND, "Address not found");
    }
    body["_id"] = json!(id);
    if body["isDefault"] == true {
        for address in &mut data.addresses {
            address["isDefault"] = json!(false);
        }
    }
    for address in &mut data.addresses {
        if address["_id"] == id.as_str() {
            *address = body.clone();
        }
    }
    ok(body)
}

async fn delete_address(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.hit("delete-address");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    state.data.lock().addresses.retain(|a| a["_id"] != id.as_str());
    ok_empty("Address deleted")
}

// -- wishlist ----------------------------------------------------------------

async fn wishlist(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("wishlist");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    let products: Vec<Value> = state
        .data
        .lock()
        .wishlist
        .iter()
        .filter_map(|id| find_product(id))
        .collect();
    ok(Value::Array(products))
}

async fn add_to_wishlist(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.hit("add-wishlist");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    if find_product(&id).is_none() {
        return fail(StatusCode::NOT_FOUND, "Product not found");
    }
    let mut data = state.data.lock();
    if !data.wishlist.contains(&id) {
        data.wishlist.push(id);
    }
    ok_empty("Added to wishlist")
}

async fn remove_from_wishlist(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.hit("remove-wishlist");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    state.data.lock().wishlist.retain(|p| *p != id);
    ok_empty("Removed from wishlist")
}

// -- catalog -----------------------------------------------------------------

async fn products(State(state): Shared, Query(query): Query<HashMap<String, String>>) -> Response {
    state.hit("products");
    let category = query.get("category");
    let products: Vec<Value> = catalog()
        .into_iter()
        .filter(|p| category.is_none_or(|c| p["category"] == c.as_str()))
        .collect();
    let total = products.len();
    ok(json!({ "products": products, "page": 1, "totalPages": 1, "total": total }))
}

async fn product(State(state): Shared, Path(id): Path<String>) -> Response {
    state.hit("product");
    find_product(&id).map_or_else(|| fail(StatusCode::NOT_FOUND, "Product not found"), ok)
}

async fn search(State(state): Shared, Query(query): Query<HashMap<String, String>>) -> Response {
    state.hit("search");
    let q = query.get("q").map(|q| q.to_lowercase()).unwrap_or_default();
    let products: Vec<Value> = catalog()
        .into_iter()
        .filter(|p| {
            p["name"]
                .as_str()
                .is_some_and(|name| name.to_lowercase().contains(&q))
        })
        .collect();
    ok(Value::Array(products))
}

async fn categories(State(state): Shared) -> Response {
    state.hit("categories");
    ok(json!([
        { "_id": "c1", "name": "Shirts", "slug": "shirts", "productCount": 1 },
        { "_id": "c2", "name": "Bags", "slug": "bags", "productCount": 1 }
    ]))
}

// -- orders and payments -----------------------------------------------------

async fn my_orders(State(state): Shared, headers: HeaderMap) -> Response {
    state.hit("my-orders");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    ok(Value::Array(state.data.lock().orders.clone()))
}

async fn create_order(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.hit("create-order");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    if body["items"].as_array().is_none_or(Vec::is_empty) {
        return fail(StatusCode::BAD_REQUEST, "No order items");
    }

    let id = state.next_id("o");
    let mut order = body;
    order["_id"] = json!(id);
    order["orderNumber"] = json!(format!("ORD-{id}"));
    let status = state
        .created_status
        .lock()
        .clone()
        .unwrap_or_else(|| "confirmed".to_string());
    order["orderStatus"] = json!(status);
    order["paymentStatus"] = json!("pending");
    order["createdAt"] = json!("2026-10-18T09:30:00Z");
    state.data.lock().orders.push(order.clone());
    (StatusCode::CREATED, ok(order)).into_response()
}

async fn order(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    state.hit("order");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    let order = state
        .data
        .lock()
        .orders
        .iter()
        .find(|o| o["_id"] == id.as_str())
        .cloned();
    order.map_or_else(|| fail(StatusCode::NOT_FOUND, "Order not found"), ok)
}

#[allow(clippy::cast_possible_truncation)]
async fn create_payment(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.hit("create-payment");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    let Some(order_id) = body["orderId"].as_str() else {
        return fail(StatusCode::BAD_REQUEST, "orderId is required");
    };
    let total = state
        .data
        .lock()
        .orders
        .iter()
        .find(|o| o["_id"] == order_id)
        .and_then(|o| o["totalAmount"].as_f64());
    let Some(total) = total else {
        return fail(StatusCode::NOT_FOUND, "Order not found");
    };
    ok(json!({
        "gatewayOrderId": format!("gw_{order_id}"),
        "amount": (total * 100.0).round() as i64,
        "currency": "INR",
        "key": "rzp_test_key"
    }))
}

async fn verify_payment(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.hit("verify-payment");
    if let Err(r) = state.authorize(&headers) {
        return r;
    }
    if state.verify_fails.load(Ordering::SeqCst) || body["signature"] != VALID_SIGNATURE {
        return fail(StatusCode::BAD_REQUEST, "Payment verification failed");
    }
    let mut data = state.data.lock();
    let Some(order) = data.orders.iter_mut().find(|o| o["_id"] == body["orderId"]) else {
        return fail(StatusCode::NOT_FOUND, "Order not found");
    };
    order["paymentStatus"] = json!("paid");
    ok(order.clone())
}

/// A running mock backend. Shuts down on drop.
#[derive(Debug)]
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown: CancellationToken,
}

impl MockBackend {
    /// Start a backend on an ephemeral localhost port.
    ///
    /// # Panics
    ///
    /// Panics if the port cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/verify-otp", post(verify_otp))
            .route("/api/auth/resend-otp", post(accepted))
            .route("/api/auth/forgot-password", post(accepted))
            .route("/api/auth/reset-password/{token}", post(accepted))
            .route("/api/auth/refresh-token", post(refresh_token))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/me", get(me))
            .route("/api/auth/addresses", get(addresses).post(add_address))
            .route(
                "/api/auth/addresses/{id}",
                put(update_address).delete(delete_address),
            )
            .route("/api/auth/wishlist", get(wishlist))
            .route(
                "/api/auth/wishlist/{id}",
                post(add_to_wishlist).delete(remove_from_wishlist),
            )
            .route("/api/products", get(products))
            .route("/api/products/search", get(search))
            .route("/api/products/categories", get(categories))
            .route("/api/products/{id}", get(product))
            .route("/api/orders", post(create_order))
            .route("/api/orders/my-orders", get(my_orders))
            .route("/api/orders/{id}", get(order))
            .route("/api/payments/create-order", post(create_payment))
            .route("/api/payments/verify", post(verify_payment))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
        });

        Self {
            addr,
            state,
            shutdown,
        }
    }

    /// Base URL of the mock API, with a trailing slash.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Storefront configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is rejected.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let url = self.api_url();
        StorefrontConfig::from_vars(|key| match key {
            "BAZAAR_API_URL" => Some(url.clone()),
            "BAZAAR_REQUEST_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .expect("Mock backend config is valid")
    }

    /// A storefront over in-memory storage.
    ///
    /// # Panics
    ///
    /// Panics if the storefront cannot be built.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        self.storefront_with(Arc::new(MemoryStorage::new()))
    }

    /// A storefront over `storage`.
    ///
    /// # Panics
    ///
    /// Panics if the storefront cannot be built.
    #[must_use]
    pub fn storefront_with(&self, storage: Arc<dyn Storage>) -> Storefront {
        Storefront::with_storage(self.config(), storage).expect("Storefront builds")
    }

    /// Number of requests a route has served. Rejected sessions are also
    /// counted under `unauthorized`.
    #[must_use]
    pub fn calls(&self, route: &str) -> usize {
        self.state.calls.lock().get(route).copied().unwrap_or(0)
    }

    /// Invalidate every session cookie issued so far. Refresh cookies stay
    /// valid.
    pub fn expire_sessions(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Make the refresh endpoint reject every call.
    pub fn fail_refresh(&self, fail: bool) {
        self.state.refresh_fails.store(fail, Ordering::SeqCst);
    }

    /// Hold refresh responses back so concurrent 401s pile up.
    pub fn delay_refresh(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Make payment verification reject every signature.
    pub fn fail_verification(&self, fail: bool) {
        self.state.verify_fails.store(fail, Ordering::SeqCst);
    }

    /// Give newly created orders `status` instead of `confirmed`.
    pub fn set_created_order_status(&self, status: &str) {
        *self.state.created_status.lock() = Some(status.to_string());
    }

    /// Seed an address directly in the backend.
    pub fn seed_address(&self, mut address: Value) -> String {
        let id = self.state.next_id("a");
        address["_id"] = json!(id);
        self.state.data.lock().addresses.push(address);
        id
    }

    /// Addresses as the backend stores them.
    #[must_use]
    pub fn stored_addresses(&self) -> Vec<Value> {
        self.state.data.lock().addresses.clone()
    }

    /// Orders as the backend stores them.
    #[must_use]
    pub fn stored_orders(&self) -> Vec<Value> {
        self.state.data.lock().orders.clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start a backend and sign a fresh storefront in as [`TEST_EMAIL`].
///
/// # Panics
///
/// Panics if login fails.
pub async fn signed_in() -> (MockBackend, Storefront) {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();
    storefront
        .account()
        .login(TEST_EMAIL, &secrecy::SecretString::from(TEST_PASSWORD))
        .await
        .expect("Login succeeds");
    (backend, storefront)
}
