//! Account types.

use bazaar_core::{Email, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// The authenticated shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend user ID.
    #[serde(alias = "_id")]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: Email,
    /// Contact phone, if the user supplied one.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Sign-up form data.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Email address (validated before sending).
    pub email: String,
    /// Phone number (validated before sending).
    pub phone: String,
    /// Chosen password.
    pub password: SecretString,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A registration that is waiting for its one-time password.
///
/// Held by the caller between sign-up and OTP entry; the account store never
/// keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    /// The email the OTP was sent to.
    pub email: Email,
}
