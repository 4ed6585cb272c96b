//! Product reviews.

use bazaar_core::{ProductId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;

/// Lowest allowed star rating.
pub const MIN_RATING: u8 = 1;
/// Highest allowed star rating.
pub const MAX_RATING: u8 = 5;

/// The reviewer as embedded in a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
}

/// A published review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "_id")]
    pub id: ReviewId,
    pub product: ProductId,
    pub user: Reviewer,
    pub rating: u8,
    #[serde(default)]
    pub title: Option<String>,
    pub comment: String,
    /// Set when the reviewer has a delivered order for the product.
    #[serde(default)]
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Whether `user` wrote this review.
    #[must_use]
    pub fn is_by(&self, user: &UserId) -> bool {
        &self.user.id == user
    }
}

fn validate_rating(rating: u8, errors: &mut FieldErrors) {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        errors.add(
            "rating",
            format!("rating must be between {MIN_RATING} and {MAX_RATING}"),
        );
    }
}

/// Body for creating a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub product_id: ProductId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub comment: String,
}

impl ReviewInput {
    /// Check the rating range and that the comment is not blank.
    ///
    /// # Errors
    ///
    /// Returns field-keyed messages for every invalid field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validate_rating(self.rating, &mut errors);
        if self.comment.trim().is_empty() {
            errors.add("comment", "comment is required");
        }
        errors.into_result()
    }
}

/// Body for editing an existing review. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ReviewUpdate {
    /// Check whichever fields are set.
    ///
    /// # Errors
    ///
    /// Returns field-keyed messages for every invalid field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(rating) = self.rating {
            validate_rating(rating, &mut errors);
        }
        if self.comment.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.add("comment", "comment cannot be empty");
        }
        errors.into_result()
    }
}

/// Aggregate rating for a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
    /// Count per star value, index 0 holding one-star reviews.
    #[serde(default)]
    pub distribution: [u32; 5],
}

/// One page of reviews plus the product's rating summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub stats: ReviewStats,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(rating: u8, comment: &str) -> ReviewInput {
        ReviewInput {
            product_id: ProductId::new("p1"),
            rating,
            title: None,
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_review_input_validation() {
        assert!(input(5, "Great fit").validate().is_ok());

        let errors = input(0, "   ").validate().unwrap_err();
        assert_eq!(errors.get("rating"), Some("rating must be between 1 and 5"));
        assert_eq!(errors.get("comment"), Some("comment is required"));

        assert!(input(6, "ok").validate().is_err());
    }

    #[test]
    fn test_review_update_only_checks_set_fields() {
        assert!(ReviewUpdate::default().validate().is_ok());

        let update = ReviewUpdate {
            comment: Some(String::new()),
            ..ReviewUpdate::default()
        };
        assert_eq!(
            update.validate().unwrap_err().get("comment"),
            Some("comment cannot be empty")
        );

        let body = serde_json::to_value(ReviewUpdate {
            rating: Some(4),
            ..ReviewUpdate::default()
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "rating": 4 }));
    }

    #[test]
    fn test_review_ownership() {
        let review: Review = serde_json::from_value(serde_json::json!({
            "_id": "r1",
            "product": "p1",
            "user": { "_id": "u1", "name": "Asha" },
            "rating": 4,
            "comment": "Nice",
            "createdAt": "2026-02-01T08:30:00Z"
        }))
        .unwrap();

        assert!(review.is_by(&UserId::new("u1")));
        assert!(!review.is_by(&UserId::new("u2")));
        assert!(!review.verified_purchase);
    }
}
