//! Bazaar storefront client library.
//!
//! This crate is the client-side core of the Bazaar storefront: everything a
//! presentation layer needs to browse the catalog, manage a cart, sign in,
//! check out and keep an in-app notification log, without the presentation
//! itself.
//!
//! # Architecture
//!
//! - [`api::ApiClient`] - `reqwest` client for the backend REST API with
//!   cookie credentials and a single-flight session refresh policy
//! - [`cart::CartStore`] - local cart with derived pricing, persisted on every mutation
//! - [`account::AccountStore`] - session lifecycle plus addresses, orders and wishlist
//! - [`notifications::NotificationStore`] - client-only notification log
//! - [`checkout::Checkout`] - order placement and payment handoff
//! - [`state::Storefront`] - facade wiring the pieces together
//!
//! Stores are cheap to clone and own their state exclusively; all mutation
//! goes through their methods.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod loading;
pub mod models;
pub mod notifications;
pub mod pricing;
pub mod session;
pub mod state;
pub mod storage;

pub use account::{AccountError, AccountStore};
pub use api::{ApiClient, ApiError, ClientEvent};
pub use cart::{CartError, CartLine, CartStore, LineOptions};
pub use checkout::{Checkout, CheckoutError, CheckoutOutcome, CheckoutRequest};
pub use config::StorefrontConfig;
pub use error::{FieldErrors, StorefrontError};
pub use notifications::NotificationStore;
pub use pricing::{PricingPolicy, ShippingPolicy, ShippingRule};
pub use session::{Session, SessionState};
pub use state::{BootstrapReport, StartupError, Storefront};
pub use storage::{FileStorage, MemoryStorage, Storage};
