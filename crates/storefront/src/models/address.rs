//! Address book types.

use bazaar_core::{AddressId, Phone, Pincode};
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;

/// The postal part of an address.
///
/// Orders embed a full copy of this so that the shipping address survives
/// later edits or deletion of the address-book entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    /// Recipient name.
    pub name: String,
    /// Recipient phone.
    pub phone: String,
    /// First address line.
    pub line1: String,
    /// Second address line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// Nearby landmark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Six-digit pincode.
    pub pincode: String,
}

impl AddressDetails {
    /// Check every field and collect all problems at once.
    ///
    /// # Errors
    ///
    /// Returns the field-keyed messages when any field is invalid.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        for (field, value) in [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
        ] {
            if value.trim().is_empty() {
                errors.add(field, format!("{field} is required"));
            }
        }

        if let Err(e) = Phone::parse(&self.phone) {
            errors.add("phone", e.to_string());
        }
        if let Err(e) = Pincode::parse(&self.pincode) {
            errors.add("pincode", e.to_string());
        }

        errors.into_result()
    }

    /// Single-line rendering for lists and confirmations.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|s| !s.is_empty()) {
            parts.push(line2);
        }
        parts.extend([self.city.as_str(), self.state.as_str(), self.pincode.as_str()]);
        parts.join(", ")
    }
}

/// An address-book entry. The ID is always assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Backend address ID.
    #[serde(alias = "_id")]
    pub id: AddressId,
    /// Postal details.
    #[serde(flatten)]
    pub details: AddressDetails,
    /// Whether this is the user's default shipping address.
    #[serde(default)]
    pub is_default: bool,
}

/// Body for creating or updating an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    /// Postal details.
    #[serde(flatten)]
    pub details: AddressDetails,
    /// Make this the default shipping address.
    pub is_default: bool,
}

impl From<Address> for AddressInput {
    fn from(address: Address) -> Self {
        Self {
            details: address.details,
            is_default: address.is_default,
        }
    }
}
