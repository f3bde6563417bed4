//! Natural-language cart
//!
//! Resolves the product mentions of a parsed cart command against the active
//! catalog. An "add" command places a PENDING order for the resolved lines;
//! "remove" and "clear" are only interpreted and echoed back.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    contains_pattern, fallback_search_words, parse_cart_command, CartAction, CartLineRequest,
    MAX_SUGGESTIONS, MIN_SUGGESTION_QUERY_CHARS,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::order::{CreateOrderInput, OrderDetail, OrderLineInput, OrderService};

#[derive(Clone)]
pub struct CartService {
    db: PgPool,
    orders: OrderService,
}

#[derive(Debug, Clone, FromRow)]
struct MatchedProduct {
    id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCartLine {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub stock_available: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartCommandResponse {
    pub prompt: String,
    pub interpreted_action: CartAction,
    pub items: Vec<ResolvedCartLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderDetail>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSuggestion {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionsResponse {
    pub query: String,
    pub count: usize,
    pub suggestions: Vec<ProductSuggestion>,
}

impl CartService {
    pub fn new(db: PgPool) -> Self {
        Self {
            orders: OrderService::new(db.clone()),
            db,
        }
    }

    /// Interpret `prompt`; an add command becomes a PENDING order
    pub async fn apply_command(&self, user_id: Uuid, prompt: &str) -> AppResult<CartCommandResponse> {
        let command = parse_cart_command(prompt)?;

        let mut items = Vec::with_capacity(command.items.len());
        for line in &command.items {
            items.push(self.resolve(line).await?);
        }

        let order = match command.action {
            CartAction::Add => {
                let input = CreateOrderInput {
                    items: items
                        .iter()
                        .map(|item| OrderLineInput {
                            product_id: item.product_id,
                            quantity: item.quantity,
                        })
                        .collect(),
                    shipping_address: String::new(),
                    phone: String::new(),
                };
                let order = self.orders.create(user_id, input).await?;
                tracing::info!(
                    "Cart command placed order {} with {} line(s)",
                    order.order.id,
                    order.items.len()
                );
                Some(order)
            }
            CartAction::Remove | CartAction::Clear => None,
        };

        Ok(CartCommandResponse {
            prompt: prompt.trim().to_string(),
            interpreted_action: command.action,
            items,
            order,
        })
    }

    async fn resolve(&self, line: &CartLineRequest) -> AppResult<ResolvedCartLine> {
        let product = self.find_product(&line.search).await?.ok_or_else(|| AppError::Validation {
            field: "prompt".to_string(),
            message: format!("No product matches \"{}\"", line.search),
            message_es: format!("No se encontró el producto: \"{}\"", line.search),
        })?;
        Ok(ResolvedCartLine {
            product_id: product.id,
            name: product.name,
            quantity: line.quantity,
            price: product.price,
            stock_available: product.stock,
        })
    }

    /// Name match first, then description, then any significant word of the name
    async fn find_product(&self, search: &str) -> AppResult<Option<MatchedProduct>> {
        for column in ["name", "description"] {
            if let Some(found) = self.first_match(column, search).await? {
                return Ok(Some(found));
            }
        }
        for word in fallback_search_words(search) {
            if let Some(found) = self.first_match("name", word).await? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    async fn first_match(&self, column: &str, term: &str) -> AppResult<Option<MatchedProduct>> {
        let sql = format!(
            "SELECT id, name, price, stock FROM products \
             WHERE is_active AND {} ILIKE $1 ORDER BY name LIMIT 1",
            column
        );
        let found = sqlx::query_as::<_, MatchedProduct>(&sql)
            .bind(contains_pattern(term))
            .fetch_optional(&self.db)
            .await?;
        Ok(found)
    }

    /// Autocomplete for the cart search box
    pub async fn suggestions(&self, query: &str) -> AppResult<SuggestionsResponse> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGESTION_QUERY_CHARS {
            return Ok(SuggestionsResponse {
                query: query.to_string(),
                count: 0,
                suggestions: Vec::new(),
            });
        }

        let suggestions = sqlx::query_as::<_, ProductSuggestion>(
            r#"
            SELECT p.id, p.name, p.price, p.stock, c.name AS category
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.is_active AND p.name ILIKE $1
            ORDER BY p.name
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(query))
        .bind(MAX_SUGGESTIONS)
        .fetch_all(&self.db)
        .await?;

        Ok(SuggestionsResponse {
            query: query.to_string(),
            count: suggestions.len(),
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{insert_product, insert_user};
    use shared::OrderStatus;

    #[sqlx::test(migrations = "./migrations")]
    async fn test_add_command_places_pending_order(pool: PgPool) {
        let user_id = insert_user(&pool, "compradora").await;
        let laptop = insert_product(&pool, "Laptop Gamer 15", Decimal::new(120000, 2), 5).await;
        let mouse = insert_product(&pool, "Mouse Inalámbrico", Decimal::new(2550, 2), 20).await;
        let service = CartService::new(pool.clone());

        let response = service
            .apply_command(user_id, "Quiero 2 laptop y 1 mouse")
            .await
            .unwrap();
        assert_eq!(response.interpreted_action, CartAction::Add);
        let ids: Vec<Uuid> = response.items.iter().map(|i| i.product_id).collect();
        assert_eq!(ids, vec![laptop, mouse]);

        let order = response.order.unwrap();
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert_eq!(order.order.total_price, Decimal::new(242550, 2));

        let stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(laptop)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stock, 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_unknown_product_and_short_queries(pool: PgPool) {
        let user_id = insert_user(&pool, "comprador").await;
        insert_product(&pool, "Smartphone X", Decimal::new(50000, 2), 1).await;
        let service = CartService::new(pool.clone());

        let err = service
            .apply_command(user_id, "agrega 1 tostadora")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = service
            .apply_command(user_id, "agrega 3 smartphone")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));

        let cleared = service.apply_command(user_id, "vaciar carrito").await.unwrap();
        assert_eq!(cleared.interpreted_action, CartAction::Clear);
        assert!(cleared.order.is_none());

        assert_eq!(service.suggestions("s").await.unwrap().count, 0);
        let found = service.suggestions("smart").await.unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.suggestions[0].name, "Smartphone X");
        assert!(found.suggestions[0].category.is_none());
    }
}
