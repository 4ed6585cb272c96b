//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_API_URL` - Backend REST API base URL (e.g., `https://api.example.com/api/`)
//!
//! ## Optional
//! - `BAZAAR_DATA_DIR` - Directory for persisted cart, session and notifications (default: .bazaar)
//! - `BAZAAR_REQUEST_TIMEOUT_SECS` - Per-request timeout in seconds (default: 30)
//! - `BAZAAR_SHIPPING_POLICY` - `free`, `flat:<fee>` or `free_above:<threshold>:<fee>` (default: free)
//! - `BAZAAR_TAX_RATE` - Tax rate as a fraction (default: 0.18)
//! - `BAZAAR_PAYMENT_FEE_RATE` - Online payment processing fee as a fraction (default: 0.02)
//! - `BAZAAR_PAYMENT_KEY` - Public payment widget key, used when the backend does not send one
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::pricing::{DEFAULT_PAYMENT_FEE_RATE, DEFAULT_TAX_RATE, PricingPolicy, ShippingPolicy};

const DEFAULT_DATA_DIR: &str = ".bazaar";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Backend REST API base URL
    pub api_url: Url,
    /// Directory for client-persisted state
    pub data_dir: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Shipping rule applied to the cart
    pub shipping: ShippingPolicy,
    /// Tax rate applied to the subtotal
    pub tax_rate: Decimal,
    /// Processing fee rate for online payments
    pub payment_fee_rate: Decimal,
    /// Fallback payment widget key
    pub payment_key: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("api_url", &self.api_url.as_str())
            .field("data_dir", &self.data_dir)
            .field("request_timeout", &self.request_timeout)
            .field("shipping", &self.shipping)
            .field("tax_rate", &self.tax_rate)
            .field("payment_fee_rate", &self.payment_fee_rate)
            .field(
                "payment_key",
                &self.payment_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_url = env.required("BAZAAR_API_URL")?;
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_API_URL".to_string(), e.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_API_URL".to_string(),
                "must be an http or https URL".to_string(),
            ));
        }

        let timeout_secs = env
            .or_default("BAZAAR_REQUEST_TIMEOUT_SECS", &DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "BAZAAR_REQUEST_TIMEOUT_SECS".to_string(),
                    "must be a positive number of seconds".to_string(),
                )
            })?;

        let shipping = env
            .or_default("BAZAAR_SHIPPING_POLICY", "free")
            .parse::<ShippingPolicy>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BAZAAR_SHIPPING_POLICY".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_url,
            data_dir: PathBuf::from(env.or_default("BAZAAR_DATA_DIR", DEFAULT_DATA_DIR)),
            request_timeout: Duration::from_secs(timeout_secs),
            shipping,
            tax_rate: env.rate("BAZAAR_TAX_RATE", DEFAULT_TAX_RATE)?,
            payment_fee_rate: env.rate("BAZAAR_PAYMENT_FEE_RATE", DEFAULT_PAYMENT_FEE_RATE)?,
            payment_key: env.optional("BAZAAR_PAYMENT_KEY").map(SecretString::from),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// The pricing policy described by this configuration.
    #[must_use]
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy::new(self.shipping, self.tax_rate, self.payment_fee_rate)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Get a rate between 0 and 1.
    fn rate(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        value
            .trim()
            .parse::<Decimal>()
            .ok()
            .filter(|rate| (Decimal::ZERO..=Decimal::ONE).contains(rate))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(key.to_string(), "must be a number between 0 and 1".to_string())
            })
    }
}
