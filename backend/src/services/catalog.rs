//! Catalog service: categories, products and product reviews

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_price, validate_rating, validate_stock, Category, PaginatedResponse, Pagination,
    Product, RatingSummary, Review,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{unique_violation, AppError, AppResult};

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Product as returned by the API, with its category name and review aggregate
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    #[serde(flatten)]
    pub rating: RatingSummary,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    #[sqlx(flatten)]
    product: Product,
    category_name: Option<String>,
    ratings: Vec<i16>,
}

impl From<ProductRow> for ProductView {
    fn from(row: ProductRow) -> Self {
        Self {
            rating: RatingSummary::from_ratings(&row.ratings),
            product: row.product,
            category_name: row.category_name,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub warranty_info: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub warranty_info: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    pub rating: i16,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub comment: String,
}

/// Outcome of a product delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRemoval {
    Deleted,
    /// Referenced by past orders, so only deactivated
    Deactivated,
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id, p.warranty_info,
           p.is_active, p.created_at, p.updated_at,
           c.name AS category_name,
           COALESCE(ARRAY_AGG(r.rating) FILTER (WHERE r.rating IS NOT NULL), '{}') AS ratings
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN reviews r ON r.product_id = p.id
"#;

fn price_error(msg: &'static str) -> AppError {
    AppError::Validation {
        field: "price".to_string(),
        message: msg.to_string(),
        message_es: "Precio inválido".to_string(),
    }
}

fn stock_error(msg: &'static str) -> AppError {
    AppError::Validation {
        field: "stock".to_string(),
        message: msg.to_string(),
        message_es: "Stock inválido".to_string(),
    }
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Category".to_string()))
    }

    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) \
             RETURNING id, name, description",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, "name"))?;
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, input: CategoryInput) -> AppResult<Category> {
        input.validate()?;
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, description = $3 WHERE id = $1 \
             RETURNING id, name, description",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| unique_violation(e, "name"))?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))
    }

    /// Products of a deleted category are kept without a category
    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Category".to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        include_inactive: bool,
    ) -> AppResult<PaginatedResponse<ProductView>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let where_clause = r#"
            WHERE ($1 OR p.is_active)
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::text IS NULL OR LOWER(p.name) LIKE $3 OR LOWER(p.description) LIKE $3)
              AND ($4::numeric IS NULL OR p.price >= $4)
              AND ($5::numeric IS NULL OR p.price <= $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM products p {}",
            where_clause
        ))
        .bind(include_inactive)
        .bind(filter.category_id)
        .bind(&search)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{} {} GROUP BY p.id, c.name ORDER BY p.created_at DESC LIMIT $6 OFFSET $7",
            PRODUCT_SELECT, where_clause
        ))
        .bind(include_inactive)
        .bind(filter.category_id)
        .bind(&search)
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let products = rows.into_iter().map(ProductView::from).collect();
        Ok(PaginatedResponse::new(products, &pagination, total.max(0) as u64))
    }

    pub async fn get_product(&self, id: Uuid, include_inactive: bool) -> AppResult<ProductView> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "{} WHERE p.id = $1 AND ($2 OR p.is_active) GROUP BY p.id, c.name",
            PRODUCT_SELECT
        ))
        .bind(id)
        .bind(include_inactive)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        Ok(row.into())
    }

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductView> {
        input.validate()?;
        validate_price(input.price).map_err(price_error)?;
        validate_stock(input.stock).map_err(stock_error)?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO products (name, description, price, stock, category_id, warranty_info)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.warranty_info)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Product {} created", id);
        self.get_product(id, true).await
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<ProductView> {
        input.validate()?;
        if let Some(price) = input.price {
            validate_price(price).map_err(price_error)?;
        }
        if let Some(stock) = input.stock {
            validate_stock(stock).map_err(stock_error)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                category_id = COALESCE($6, category_id),
                warranty_info = COALESCE($7, warranty_info),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.warranty_info)
        .bind(input.is_active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        self.get_product(id, true).await
    }

    pub async fn delete_product(&self, id: Uuid) -> AppResult<ProductRemoval> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = if referenced {
            sqlx::query("UPDATE products SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deactivated
        } else {
            sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            ProductRemoval::Deleted
        };

        tx.commit().await?;
        tracing::info!("Product {} removed: {:?}", id, outcome);
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    pub async fn list_reviews(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT id, product_id, user_id, rating, comment, created_at \
             FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(reviews)
    }

    pub async fn create_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: CreateReviewInput,
    ) -> AppResult<Review> {
        input.validate()?;
        validate_rating(input.rating).map_err(|msg| AppError::Validation {
            field: "rating".to_string(),
            message: msg.to_string(),
            message_es: "La calificación debe estar entre 1 y 5".to_string(),
        })?;

        // Reviews only for products visible in the catalog
        self.get_product(product_id, false).await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, user_id, rating, comment, created_at
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(&self.db)
        .await
        .map_err(|e| unique_violation(e, "review"))?;

        Ok(review)
    }

    pub async fn get_review(&self, review_id: Uuid) -> AppResult<Review> {
        sqlx::query_as::<_, Review>(
            "SELECT id, product_id, user_id, rating, comment, created_at FROM reviews WHERE id = $1",
        )
        .bind(review_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review".to_string()))
    }

    pub async fn delete_review(&self, review_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
