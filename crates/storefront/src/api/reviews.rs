//! Review endpoints.

use bazaar_core::{ProductId, ReviewId};
use tracing::instrument;

use super::{ApiClient, ApiError, ApiRequest};
use crate::models::{Review, ReviewInput, ReviewPage, ReviewStats, ReviewUpdate};

impl ApiClient {
    /// A page of reviews for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn product_reviews(&self, product: &ProductId, page: u32) -> Result<ReviewPage, ApiError> {
        self.fetch(
            ApiRequest::get("reviews/product")
                .segment(product.as_str())
                .query(vec![("page", page.max(1).to_string())]),
        )
        .await
    }

    /// Rating summary for a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn review_stats(&self, product: &ProductId) -> Result<ReviewStats, ApiError> {
        self.fetch(
            ApiRequest::get("reviews/product")
                .segment(product.as_str())
                .suffix("stats"),
        )
        .await
    }

    /// Post a review. The input is validated before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for an invalid rating or empty comment,
    /// or an error if the backend rejects the review.
    #[instrument(skip(self, input), fields(product_id = %input.product_id, rating = input.rating))]
    pub async fn create_review(&self, input: &ReviewInput) -> Result<Review, ApiError> {
        input.validate().map_err(ApiError::Validation)?;
        let review: Review = self.fetch(ApiRequest::post("reviews").json(input)?).await?;
        self.invalidate_ratings(Some(&input.product_id)).await;
        Ok(review)
    }

    /// Reviews written by the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn my_reviews(&self) -> Result<Vec<Review>, ApiError> {
        self.fetch(ApiRequest::get("reviews/my-reviews")).await
    }

    /// Edit one of the user's reviews.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for invalid fields, or an error if the
    /// backend rejects the update.
    #[instrument(skip(self, update), fields(review_id = %id))]
    pub async fn update_review(&self, id: &ReviewId, update: &ReviewUpdate) -> Result<Review, ApiError> {
        update.validate().map_err(ApiError::Validation)?;
        let review: Review = self
            .fetch(ApiRequest::put("reviews").segment(id.as_str()).json(update)?)
            .await?;
        self.invalidate_ratings(Some(&review.product)).await;
        Ok(review)
    }

    /// Delete one of the user's reviews.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(review_id = %id))]
    pub async fn delete_review(&self, id: &ReviewId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete("reviews").segment(id.as_str()))
            .await?;
        // The response does not name the product.
        self.invalidate_ratings(None).await;
        Ok(())
    }
}
