//! Product catalog types.

use bazaar_core::{CategoryId, Price, ProductId};
use serde::{Deserialize, Serialize};

/// A product as returned by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Backend product ID.
    #[serde(alias = "_id")]
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Current selling price.
    pub price: Price,
    /// Price before discount, when the product is on sale.
    #[serde(default)]
    pub original_price: Option<Price>,
    /// Image URLs, primary first.
    #[serde(default)]
    pub images: Vec<String>,
    /// Category name.
    #[serde(default)]
    pub category: Option<String>,
    /// Available sizes (empty when the product has no size option).
    #[serde(default)]
    pub sizes: Vec<String>,
    /// Available colors (empty when the product has no color option).
    #[serde(default)]
    pub colors: Vec<String>,
    /// Units in stock, when the backend reports it.
    #[serde(default)]
    pub stock: Option<u32>,
    /// Average review rating.
    #[serde(default)]
    pub rating: f64,
    /// Number of reviews.
    #[serde(default)]
    pub num_reviews: u32,
}

impl Product {
    /// The primary image URL.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether the backend reports the product as sold out.
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock == Some(0)
    }

    /// Capture the fields the cart keeps for this product.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            image: self.primary_image().map(str::to_owned),
            price: self.price,
            stock: self.stock,
        }
    }
}

/// Denormalized copy of a product taken when it is added to the cart.
///
/// Never re-synced with the catalog: the cart keeps the price the shopper saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Primary image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Unit price at add-time.
    pub price: Price,
    /// Stock hint at add-time.
    #[serde(default)]
    pub stock: Option<u32>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Backend category ID.
    #[serde(alias = "_id")]
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    #[serde(default)]
    pub slug: String,
    /// Number of active products in the category.
    #[serde(default)]
    pub product_count: u32,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Popular,
}

impl ProductSort {
    /// Query-string value understood by the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
            Self::Popular => "popular",
        }
    }
}

impl std::str::FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "rating" => Ok(Self::Rating),
            "popular" => Ok(Self::Popular),
            _ => Err(format!("invalid sort: {s}")),
        }
    }
}

/// Filters and pagination for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Category name or slug.
    pub category: Option<String>,
    /// Lower price bound (inclusive).
    pub min_price: Option<Price>,
    /// Upper price bound (inclusive).
    pub max_price: Option<Price>,
    /// Free-text search.
    pub search: Option<String>,
    /// Sort order.
    pub sort: Option<ProductSort>,
}

impl ProductQuery {
    /// Query-string pairs for the set filters, in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_owned()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.amount().to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.amount().to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_owned()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_owned()));
        }
        pairs
    }
}

/// One page of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    /// Products on this page.
    pub products: Vec<Product>,
    /// Current page (1-based).
    #[serde(default = "first_page")]
    pub page: u32,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
    /// Total number of matching products.
    #[serde(default)]
    pub total: u64,
}

const fn first_page() -> u32 {
    1
}

impl ProductPage {
    /// Whether another page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_product(id: &str, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Price::from_major(price),
            original_price: None,
            images: vec![format!("https://cdn.example.com/{id}.jpg")],
            category: Some("shirts".to_string()),
            sizes: vec!["S".to_string(), "M".to_string(), "L".to_string()],
            colors: vec!["red".to_string()],
            stock: Some(10),
            rating: 4.5,
            num_reviews: 12,
        }
    }

    #[test]
    fn test_snapshot_captures_price_and_primary_image() {
        let product = sample_product("p1", 500);
        let snapshot = product.snapshot();
        assert_eq!(snapshot.price, Price::from_major(500));
        assert_eq!(snapshot.image.as_deref(), Some("https://cdn.example.com/p1.jpg"));
        assert_eq!(snapshot.stock, Some(10));
    }

    #[test]
    fn test_query_pairs_skip_unset_and_blank_filters() {
        let query = ProductQuery {
            page: Some(2),
            category: Some(String::new()),
            search: Some("  linen  ".to_string()),
            min_price: Some(Price::from_major(100)),
            sort: Some(ProductSort::PriceDesc),
            ..ProductQuery::default()
        };

        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "2".to_string()),
                ("minPrice", "100".to_string()),
                ("search", "linen".to_string()),
                ("sort", "price_desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_product_page_defaults() {
        let page: ProductPage = serde_json::from_str(r#"{"products":[]}"#).unwrap();
        assert_eq!(page.page, 1);
        assert!(!page.has_next());
    }
}
