//! Wire and domain models for the backend REST API.
//!
//! The backend speaks camelCase JSON and identifies documents with either
//! `id` or `_id`; every model accepts both.

pub mod address;
pub mod catalog;
pub mod order;
pub mod review;
pub mod user;

pub use address::{Address, AddressDetails, AddressInput};
pub use catalog::{Category, Product, ProductPage, ProductQuery, ProductSnapshot, ProductSort};
pub use order::{
    CreateOrderRequest, Order, OrderItem, OrderTotals, PaymentConfirmation, PaymentSession,
    VerifyPaymentRequest,
};
pub use review::{Review, ReviewInput, ReviewPage, ReviewStats, ReviewUpdate, Reviewer};
pub use user::{PendingVerification, Registration, User};
