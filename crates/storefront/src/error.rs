//! Unified error handling for presentation code.
//!
//! Each layer has its own `thiserror` enum ([`ApiError`], [`CartError`],
//! [`AccountError`], [`CheckoutError`], [`ConfigError`]). [`StorefrontError`]
//! wraps them so a front-end can hold one error type, show
//! [`StorefrontError::user_message`] to the shopper and report only the
//! failures that indicate a bug or an outage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::AccountError;
use crate::api::ApiError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;

/// Validation messages keyed by form field name.
///
/// Serialized as a plain JSON object, which is also the shape the backend
/// uses for its own field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// An empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// The message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether no field has an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the map itself when at least one field failed.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Application-level error type for storefront front-ends.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Cart action refused.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Account or session action failed.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorefrontError {
    /// A message that is safe and actionable to show to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Cart(err) => err.user_message(),
            Self::Account(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Config(_) => "The storefront is not configured correctly".to_string(),
        }
    }

    /// Whether this failure should be reported to error tracking.
    ///
    /// Expected failures (validation, refused actions, expired sessions) are
    /// part of normal operation and are not reported.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_reportable(),
            Self::Account(AccountError::Api(err)) => err.is_reportable(),
            Self::Checkout(
                CheckoutError::OrderFailed(err) | CheckoutError::PaymentSetup { source: err, .. },
            ) => err.is_reportable(),
            Self::Config(_) => true,
            Self::Cart(_) | Self::Account(_) | Self::Checkout(_) => false,
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;
