//! Integration tests for login, logout, the address book and the wishlist.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bazaar_core::{AddressId, ProductId};
use bazaar_integration_tests::{
    MockBackend, TEST_EMAIL, TEST_OTP, TEST_PASSWORD, address_body, signed_in,
};
use bazaar_storefront::models::{AddressDetails, AddressInput, Registration};
use bazaar_storefront::storage::keys;
use bazaar_storefront::{AccountError, LineOptions, MemoryStorage};
use secrecy::SecretString;

fn address_input(name: &str, is_default: bool) -> AddressInput {
    AddressInput {
        details: AddressDetails {
            name: name.to_string(),
            phone: "9876543210".to_string(),
            line1: "221 Residency Road".to_string(),
            line2: None,
            landmark: Some("Near the metro".to_string()),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560025".to_string(),
        },
        is_default,
    }
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[tokio::test]
async fn test_login_loads_account_data() {
    let backend = MockBackend::start().await;
    backend.seed_address(address_body("Asha Rao", true));
    let storefront = backend.storefront();

    let user = storefront
        .account()
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();

    assert_eq!(user.name, "Asha Rao");
    assert!(storefront.session().is_authenticated());
    assert_eq!(storefront.account().addresses().len(), 1);
    assert_eq!(backend.calls("addresses"), 1);
    assert_eq!(backend.calls("my-orders"), 1);
    assert_eq!(backend.calls("wishlist"), 1);
}

#[tokio::test]
async fn test_login_rejects_malformed_email_locally() {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();

    let err = storefront
        .account()
        .login("asha.example.com", &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap_err();

    assert!(err.field_errors().unwrap().get("email").is_some());
    assert_eq!(backend.calls("login"), 0);
}

#[tokio::test]
async fn test_check_auth_restores_live_session() {
    let (backend, storefront) = signed_in().await;

    assert!(storefront.account().check_auth().await);
    assert_eq!(backend.calls("me"), 1);
    assert_eq!(backend.calls("addresses"), 2);
}

#[tokio::test]
async fn test_logout_clears_session_cart_and_account_data() {
    let backend = MockBackend::start().await;
    backend.seed_address(address_body("Asha Rao", true));
    let storage = Arc::new(MemoryStorage::new());
    let storefront = backend.storefront_with(storage.clone());
    storefront
        .account()
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();

    let product = storefront.api().product(&ProductId::new("p1")).await.unwrap();
    storefront
        .add_to_cart(&product.snapshot(), 1, LineOptions::new("M", "Blue"))
        .unwrap();
    assert!(storage.contains(keys::CART));

    storefront.logout().await;

    assert_eq!(backend.calls("logout"), 1);
    assert!(!storefront.session().is_authenticated());
    assert!(storefront.cart().is_empty());
    assert!(storefront.account().addresses().is_empty());
    assert!(!storage.contains(keys::CART));
    assert!(!storage.contains(keys::SESSION));

    // The backend dropped the cookies too.
    assert!(storefront.api().my_orders().await.is_err());
}

#[tokio::test]
async fn test_registration_with_otp() {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();
    let registration = Registration {
        name: "New Shopper".to_string(),
        email: "New.Shopper@Example.com".to_string(),
        phone: "9123456780".to_string(),
        password: SecretString::from("long-enough-password"),
    };

    let pending = storefront.account().register(&registration).await.unwrap();
    assert_eq!(pending.email.as_str(), "new.shopper@example.com");
    assert!(!storefront.session().is_authenticated());

    let err = storefront
        .account()
        .verify_otp(&pending, "000000")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid or expired OTP");

    let user = storefront
        .account()
        .verify_otp(&pending, TEST_OTP)
        .await
        .unwrap();
    assert_eq!(user.name, "New Shopper");
    assert!(storefront.session().is_authenticated());
}

#[tokio::test]
async fn test_registration_field_errors_from_backend() {
    let backend = MockBackend::start().await;
    let storefront = backend.storefront();
    let registration = Registration {
        name: "Asha Rao".to_string(),
        email: TEST_EMAIL.to_string(),
        phone: "9876543210".to_string(),
        password: SecretString::from("long-enough-password"),
    };

    let err = storefront.account().register(&registration).await.unwrap_err();

    assert!(matches!(err, AccountError::Api(_)));
    assert_eq!(
        err.field_errors().unwrap().get("email"),
        Some("Email is already registered")
    );
}

// =============================================================================
// Address Book
// =============================================================================

#[tokio::test]
async fn test_new_default_address_reconciles_locally() {
    let backend = MockBackend::start().await;
    let home = backend.seed_address(address_body("Home", true));
    let storefront = backend.storefront();
    let account = storefront.account();
    account
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();

    let office = account
        .add_address(address_input("Office", true))
        .await
        .unwrap();

    let addresses = account.addresses();
    assert_eq!(addresses.len(), 2);
    assert_eq!(
        addresses.iter().filter(|a| a.is_default).count(),
        1,
        "exactly one default"
    );
    assert_eq!(account.default_address().unwrap().id, office.id);
    assert!(!account.address(&AddressId::new(home.as_str())).unwrap().is_default);
    // No reload was needed.
    assert_eq!(backend.calls("addresses"), 1);
}

#[tokio::test]
async fn test_set_default_and_delete_address() {
    let backend = MockBackend::start().await;
    let home = AddressId::new(backend.seed_address(address_body("Home", true)));
    let office = AddressId::new(backend.seed_address(address_body("Office", false)));
    let storefront = backend.storefront();
    let account = storefront.account();
    account
        .login(TEST_EMAIL, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();

    account.set_default_address(&office).await.unwrap();
    assert_eq!(account.default_address().unwrap().id, office);
    assert!(!account.address(&home).unwrap().is_default);

    account.delete_address(&home).await.unwrap();
    assert!(account.address(&home).is_none());
    assert_eq!(backend.stored_addresses().len(), 1);

    let err = account.set_default_address(&home).await.unwrap_err();
    assert!(matches!(err, AccountError::AddressNotFound(_)));
}

#[tokio::test]
async fn test_invalid_address_is_not_sent() {
    let (backend, storefront) = signed_in().await;
    let mut input = address_input("Home", false);
    input.details.pincode = "5600".to_string();

    let err = storefront.account().add_address(input).await.unwrap_err();

    assert!(err.field_errors().unwrap().get("pincode").is_some());
    assert_eq!(backend.calls("add-address"), 0);
}

// =============================================================================
// Wishlist
// =============================================================================

#[tokio::test]
async fn test_wishlist_add_reloads_and_remove_filters() {
    let (backend, storefront) = signed_in().await;
    let account = storefront.account();
    let shirt = ProductId::new("p1");
    assert_eq!(backend.calls("wishlist"), 1);

    assert!(account.toggle_wishlist(&shirt).await.unwrap());
    assert!(account.is_in_wishlist(&shirt));
    assert_eq!(account.wishlist()[0].name, "Linen shirt");
    assert_eq!(backend.calls("wishlist"), 2);

    assert!(!account.toggle_wishlist(&shirt).await.unwrap());
    assert!(!account.is_in_wishlist(&shirt));
    assert_eq!(backend.calls("remove-wishlist"), 1);
    assert_eq!(backend.calls("wishlist"), 2);
}

#[tokio::test]
async fn test_wishlist_failure_leaves_list_unchanged() {
    let (backend, storefront) = signed_in().await;

    let err = storefront
        .account()
        .add_to_wishlist(&ProductId::new("missing"))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Product not found");
    assert!(storefront.account().wishlist().is_empty());
    assert_eq!(backend.calls("wishlist"), 1);
}
