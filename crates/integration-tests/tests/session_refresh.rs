//! Integration tests for the session refresh policy.
//!
//! These tests verify that concurrent requests hitting an expired session
//! share one refresh call, and that a failed refresh ends the session for
//! everyone with a single login-required signal.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bazaar_integration_tests::{MockBackend, TEST_EMAIL, TEST_PASSWORD, address_body, signed_in};
use bazaar_storefront::{ApiError, ClientEvent};
use secrecy::SecretString;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Single-flight Refresh
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let (backend, storefront) = signed_in().await;
    let api = storefront.api();
    backend.delay_refresh(Duration::from_millis(300));
    backend.expire_sessions();

    let (addresses, orders, wishlist, me) = tokio::join!(
        api.addresses(),
        api.my_orders(),
        api.wishlist(),
        api.current_user(false),
    );

    assert!(addresses.is_ok());
    assert!(orders.is_ok());
    assert!(wishlist.is_ok());
    assert_eq!(me.unwrap().email.as_str(), TEST_EMAIL);

    assert_eq!(backend.calls("unauthorized"), 4);
    assert_eq!(backend.calls("refresh"), 1);
    assert!(storefront.session().is_authenticated());
    assert!(!api.refresh_coordinator().is_refreshing());
}

#[tokio::test]
async fn test_each_expiry_gets_its_own_refresh() {
    let (backend, storefront) = signed_in().await;
    let api = storefront.api();

    backend.expire_sessions();
    api.addresses().await.unwrap();
    backend.expire_sessions();
    api.addresses().await.unwrap();

    assert_eq!(backend.calls("refresh"), 2);
    assert_eq!(api.refresh_coordinator().attempts(), 0);
}

// =============================================================================
// Refresh Failure
// =============================================================================

#[tokio::test]
async fn test_refresh_failure_ends_session_once() {
    let (backend, storefront) = signed_in().await;
    let api = storefront.api();
    let mut events = storefront.subscribe();
    backend.delay_refresh(Duration::from_millis(200));
    backend.fail_refresh(true);
    backend.expire_sessions();

    let (addresses, orders, wishlist) = tokio::join!(api.addresses(), api.my_orders(), api.wishlist());

    for result in [addresses.map(|_| ()), orders.map(|_| ()), wishlist.map(|_| ())] {
        let err = result.unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed(_)), "got {err:?}");
        assert!(err.is_unauthorized());
    }
    assert_eq!(backend.calls("refresh"), 1);
    assert!(!storefront.session().is_authenticated());

    assert_eq!(events.recv().await.unwrap(), ClientEvent::LoginRequired);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_refresh_cap_until_next_success() {
    let (backend, storefront) = signed_in().await;
    let api = storefront.api();
    backend.fail_refresh(true);
    backend.expire_sessions();

    assert!(matches!(
        api.my_orders().await.unwrap_err(),
        ApiError::RefreshFailed(_)
    ));
    // The cap is spent: the next 401 gives up without calling refresh.
    assert!(matches!(
        api.my_orders().await.unwrap_err(),
        ApiError::LoginRequired
    ));
    assert_eq!(backend.calls("refresh"), 1);

    // Logging in again succeeds and restores refreshing.
    backend.fail_refresh(false);
    storefront
        .account()
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();
    backend.expire_sessions();
    api.my_orders().await.unwrap();
    assert_eq!(backend.calls("refresh"), 2);
}

#[tokio::test]
async fn test_startup_session_check_is_quiet() {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();
    let mut events = storefront.subscribe();

    assert!(!storefront.account().check_auth().await);

    assert_eq!(backend.calls("me"), 1);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_auth_endpoint_401_is_not_refreshed() {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();

    let err = storefront
        .account()
        .login(TEST_EMAIL, &SecretString::from("wrong-password"))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Invalid email or password");
    assert_eq!(backend.calls("refresh"), 0);
    assert!(!storefront.session().is_authenticated());
}

#[tokio::test]
async fn test_session_watcher_drops_account_data() {
    let backend = MockBackend::start().await;
    backend.seed_address(address_body("Asha Rao", true));
    let storefront = backend.storefront();
    storefront
        .account()
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(storefront.account().addresses().len(), 1);

    let cancel = CancellationToken::new();
    let watcher = storefront.spawn_session_watcher(cancel.clone());

    backend.fail_refresh(true);
    backend.expire_sessions();
    assert!(storefront.api().my_orders().await.is_err());

    tokio::time::timeout(Duration::from_secs(2), async {
        while !storefront.account().addresses().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    watcher.await.unwrap();
}
