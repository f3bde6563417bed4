//! Order placement, status lifecycle and invoices

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    order_total, validate_quantity, warranty_window, Order, OrderItem, OrderStatus,
    PaginatedResponse, Pagination,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_price, shipping_address, phone, created_at, updated_at";

#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, message = "an order needs at least one item"))]
    pub items: Vec<OrderLineInput>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLine {
    pub product: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceCustomer {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub customer: InvoiceCustomer,
    pub shipping_address: String,
    pub issued_at: DateTime<Utc>,
    pub items: Vec<InvoiceLine>,
    pub total: Decimal,
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    username: String,
    first_name: String,
    last_name: String,
    email: String,
}

async fn fetch_order(conn: &mut PgConnection, order_id: Uuid, lock: bool) -> AppResult<Order> {
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn fetch_items(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, quantity, price \
         FROM order_items WHERE order_id = $1 ORDER BY product_name",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

/// Move an order to `next` inside the caller's transaction and run the side
/// effects of entering that status:
/// PAID opens a delivery, DELIVERED issues warranties, CANCELLED restocks.
pub(crate) async fn transition_in_tx(
    conn: &mut PgConnection,
    order_id: Uuid,
    next: OrderStatus,
) -> AppResult<Order> {
    let current = fetch_order(conn, order_id, true).await?;
    current.status.transition_to(next)?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        ORDER_COLUMNS
    ))
    .bind(order_id)
    .bind(next)
    .fetch_one(&mut *conn)
    .await?;

    match next {
        OrderStatus::Paid => {
            sqlx::query(
                r#"
                INSERT INTO deliveries (order_id, delivery_address, customer_phone)
                VALUES ($1, $2, $3)
                ON CONFLICT (order_id) DO NOTHING
                "#,
            )
            .bind(order.id)
            .bind(&order.shipping_address)
            .bind(&order.phone)
            .execute(&mut *conn)
            .await?;
        }
        OrderStatus::Delivered => issue_warranties(conn, &order).await?,
        OrderStatus::Cancelled => restock(conn, order.id).await?,
        OrderStatus::Pending | OrderStatus::Shipped => {}
    }

    tracing::info!("Order {} moved {} -> {}", order.id, current.status, next);
    Ok(order)
}

async fn restock(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW()
        FROM order_items oi
        WHERE oi.order_id = $1 AND oi.product_id = p.id
        "#,
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// One warranty per order line, unless the order already has warranties
async fn issue_warranties(conn: &mut PgConnection, order: &Order) -> AppResult<()> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM warranties WHERE order_id = $1")
        .bind(order.id)
        .fetch_one(&mut *conn)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let lines = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT p.id, p.warranty_info
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        "#,
    )
    .bind(order.id)
    .fetch_all(&mut *conn)
    .await?;

    let today: NaiveDate = Utc::now().date_naive();
    for (product_id, warranty_info) in lines {
        let (start, end) = warranty_window(today, &warranty_info);
        sqlx::query(
            r#"
            INSERT INTO warranties (order_id, product_id, user_id, start_date, end_date, terms)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id)
        .bind(product_id)
        .bind(order.user_id)
        .bind(start)
        .bind(end)
        .bind(&warranty_info)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl OrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Place an order: all lines succeed together or nothing is written
    pub async fn create(&self, user_id: Uuid, input: CreateOrderInput) -> AppResult<OrderDetail> {
        input.validate()?;

        // Merge repeated products so each row is locked and checked once
        let mut wanted: BTreeMap<Uuid, i32> = BTreeMap::new();
        for line in &input.items {
            validate_quantity(line.quantity).map_err(|msg| AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
                message_es: "La cantidad debe ser mayor que cero".to_string(),
            })?;
            let entry = wanted.entry(line.product_id).or_insert(0);
            *entry = entry.checked_add(line.quantity).ok_or_else(|| {
                AppError::ValidationError("quantity is too large".to_string())
            })?;
        }

        let ids: Vec<Uuid> = wanted.keys().copied().collect();
        let mut tx = self.db.begin().await?;

        let products = sqlx::query_as::<_, StockRow>(
            "SELECT id, name, price, stock, is_active FROM products \
             WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let by_id: BTreeMap<Uuid, &StockRow> = products.iter().map(|p| (p.id, p)).collect();
        let mut lines = Vec::with_capacity(wanted.len());
        for (product_id, quantity) in &wanted {
            let product = by_id
                .get(product_id)
                .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
            if !product.is_active {
                return Err(AppError::ValidationError(format!(
                    "Product {} is not available",
                    product.name
                )));
            }
            if product.stock < *quantity {
                return Err(AppError::InsufficientStock(format!(
                    "{}: {} available, {} requested",
                    product.name, product.stock, quantity
                )));
            }
            lines.push((*product, *quantity));
        }

        let priced: Vec<(Decimal, i32)> = lines.iter().map(|(p, q)| (p.price, *q)).collect();
        let total = order_total(&priced);

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (user_id, total_price, shipping_address, phone) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(total)
        .bind(&input.shipping_address)
        .bind(&input.phone)
        .fetch_one(&mut *tx)
        .await?;

        for (product, quantity) in &lines {
            sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(product.id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(quantity)
            .bind(product.price)
            .execute(&mut *tx)
            .await?;
        }

        let items = fetch_items(&mut tx, order.id).await?;
        tx.commit().await?;

        tracing::info!("Order {} placed by {} for {}", order.id, user_id, total);
        Ok(OrderDetail { order, items })
    }

    pub async fn list(
        &self,
        caller: &AuthUser,
        filter: OrderFilter,
    ) -> AppResult<PaginatedResponse<Order>> {
        let pagination = Pagination::new(filter.page, filter.per_page);
        let owner: Option<Uuid> = if caller.access().is_staff_user()
            || caller.access().is_manager_or_admin()
        {
            None
        } else {
            Some(caller.user_id)
        };

        let where_clause = "WHERE ($1::uuid IS NULL OR user_id = $1) \
                            AND ($2::order_status IS NULL OR status = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM orders {}",
            where_clause
        ))
        .bind(owner)
        .bind(filter.status)
        .fetch_one(&self.db)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            ORDER_COLUMNS, where_clause
        ))
        .bind(owner)
        .bind(filter.status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(orders, &pagination, total.max(0) as u64))
    }

    pub async fn get(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut conn, order_id, false).await?;
        let items = fetch_items(&mut conn, order_id).await?;
        Ok(OrderDetail { order, items })
    }

    /// Order visible to `caller`: the owner, staff or a manager
    pub async fn get_for(&self, caller: &AuthUser, order_id: Uuid) -> AppResult<OrderDetail> {
        let detail = self.get(order_id).await?;
        caller.require_owner_or_manager(detail.order.user_id)?;
        Ok(detail)
    }

    pub async fn cancel(&self, caller: &AuthUser, order_id: Uuid) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let order = fetch_order(&mut tx, order_id, true).await?;
        caller.require_owner_or_manager(order.user_id)?;

        let order = transition_in_tx(&mut tx, order_id, OrderStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn update_status(&self, order_id: Uuid, next: OrderStatus) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let order = transition_in_tx(&mut tx, order_id, next).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn invoice(&self, caller: &AuthUser, order_id: Uuid) -> AppResult<Invoice> {
        let detail = self.get_for(caller, order_id).await?;

        let customer = sqlx::query_as::<_, CustomerRow>(
            "SELECT username, first_name, last_name, email FROM users WHERE id = $1",
        )
        .bind(detail.order.user_id)
        .fetch_one(&self.db)
        .await?;

        let full_name = format!("{} {}", customer.first_name, customer.last_name)
            .trim()
            .to_string();

        let items: Vec<InvoiceLine> = detail
            .items
            .iter()
            .map(|item| InvoiceLine {
                product: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.price,
                subtotal: item.subtotal(),
            })
            .collect();

        Ok(Invoice {
            order_id: detail.order.id,
            status: detail.order.status,
            customer: InvoiceCustomer {
                full_name: if full_name.is_empty() {
                    customer.username.clone()
                } else {
                    full_name
                },
                username: customer.username,
                email: customer.email,
            },
            shipping_address: detail.order.shipping_address,
            issued_at: Utc::now(),
            items,
            total: detail.order.total_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(items: Vec<OrderLineInput>) -> CreateOrderInput {
        CreateOrderInput {
            items,
            shipping_address: "Av. Siempre Viva 742".to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_order_needs_a_line() {
        let errors = input(vec![]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));

        let one = OrderLineInput {
            product_id: Uuid::new_v4(),
            quantity: 2,
        };
        assert!(input(vec![one]).validate().is_ok());
    }
}
