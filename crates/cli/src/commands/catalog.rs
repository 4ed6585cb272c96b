//! Catalog and review commands.

use std::io::Write;

use bazaar_core::{Price, ProductId};
use bazaar_storefront::models::{ProductQuery, ProductSort, ReviewInput};
use rust_decimal::Decimal;
use tokio::io::AsyncBufRead;

use super::CommandError;
use crate::render;
use crate::shell::Shell;

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub(super) async fn products(
        &mut self,
        page: u32,
        limit: Option<u32>,
        category: Option<String>,
        sort: Option<ProductSort>,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Result<(), CommandError> {
        let query = ProductQuery {
            page: Some(page),
            limit,
            category,
            min_price: min.map(Price::new),
            max_price: max.map(Price::new),
            search: None,
            sort,
        };
        let page = self.storefront.api().products(&query).await?;

        if page.products.is_empty() {
            return self.say("No products found.");
        }
        for product in &page.products {
            self.say(render::product_row(product))?;
        }
        self.say(format!(
            "Page {} of {} ({} products)",
            page.page,
            page.total_pages.max(1),
            page.total
        ))
    }

    pub(super) async fn product(&mut self, id: &ProductId) -> Result<(), CommandError> {
        let product = self.storefront.api().product(id).await?;

        self.say(render::product_row(&product))?;
        if !product.description.is_empty() {
            self.say(&product.description)?;
        }
        if !product.sizes.is_empty() {
            self.say(format!("Sizes: {}", product.sizes.join(", ")))?;
        }
        if !product.colors.is_empty() {
            self.say(format!("Colors: {}", product.colors.join(", ")))?;
        }
        if let Some(stock) = product.stock {
            self.say(format!("In stock: {stock}"))?;
        }
        self.say(format!(
            "Rating: {:.1} ({} reviews)",
            product.rating, product.num_reviews
        ))?;

        let wishlisted = self.storefront.account().is_in_wishlist(id);
        if wishlisted {
            self.say("In your wishlist")?;
        }
        Ok(())
    }

    pub(super) async fn search(&mut self, query: &str) -> Result<(), CommandError> {
        let products = self.storefront.api().search_products(query).await?;
        if products.is_empty() {
            return self.say(format!("No products match \"{}\".", query.trim()));
        }
        for product in &products {
            self.say(render::product_row(product))?;
        }
        Ok(())
    }

    pub(super) async fn categories(&mut self) -> Result<(), CommandError> {
        let categories = self.storefront.api().categories().await?;
        for category in &categories {
            self.say(format!(
                "{:<20} {:<24} {} products",
                category.slug, category.name, category.product_count
            ))?;
        }
        Ok(())
    }

    pub(super) async fn reviews(&mut self, product: &ProductId, page: u32) -> Result<(), CommandError> {
        let reviews = self.storefront.api().product_reviews(product, page).await?;

        self.say(format!(
            "{:.1} average from {} reviews",
            reviews.stats.average_rating, reviews.stats.total_reviews
        ))?;
        for (stars, count) in reviews.stats.distribution.iter().enumerate().rev() {
            self.say(format!("  {} star: {count}", stars + 1))?;
        }
        for review in &reviews.reviews {
            self.say(render::review_row(review))?;
        }
        if reviews.page < reviews.total_pages {
            self.say(format!(
                "More reviews: reviews {product} --page {}",
                reviews.page + 1
            ))?;
        }
        Ok(())
    }

    pub(super) async fn review(
        &mut self,
        product: ProductId,
        rating: u8,
        title: Option<String>,
        comment: String,
    ) -> Result<(), CommandError> {
        let input = ReviewInput {
            product_id: product,
            rating,
            title,
            comment,
        };
        let review = self.storefront.api().create_review(&input).await?;
        self.say(format!("Thanks! Review {} posted.", review.id))
    }
}
