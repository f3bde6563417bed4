//! Reporting service for sales analytics and data export
//! Provides fixed sales/product reports, prompt-driven dynamic reports and
//! the staff dashboard

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use shared::{
    month_bounds, parse_prompt, revenue_growth_percent, DateRange, GroupBy, OrderStatus,
    ParsedPrompt, ReportColumn, ReportFormat, ReportType, LOW_STOCK_THRESHOLD,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Orders that count as sales
pub(crate) const REVENUE_FILTER: &str = "o.status IN ('PAID', 'SHIPPED', 'DELIVERED')";

/// Longest window accepted by the sales analytics endpoint
pub const MAX_ANALYTICS_DAYS: i64 = 365;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// One order in the sales report
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SalesReportRow {
    pub order_id: Uuid,
    pub customer: String,
    pub date: NaiveDate,
    pub item_count: i64,
    pub total: Decimal,
}

/// One active product in the products report
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProductReportRow {
    pub product_id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
    pub value: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderDetailRow {
    order_id: Uuid,
    date: NaiveDate,
    customer: String,
    products: String,
    item_count: i64,
    total: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSalesRow {
    product_name: String,
    units_sold: i64,
    order_count: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerSalesRow {
    customer: String,
    email: String,
    order_count: i64,
    revenue: Decimal,
}

/// A result row that can fill any column a dynamic report asks for
trait ReportRow {
    fn cell(&self, column: ReportColumn) -> Value;
}

impl ReportRow for OrderDetailRow {
    fn cell(&self, column: ReportColumn) -> Value {
        match column {
            ReportColumn::OrderId => json!(self.order_id),
            ReportColumn::OrderDate => json!(self.date),
            ReportColumn::CustomerName => json!(self.customer),
            ReportColumn::ProductList => json!(self.products),
            ReportColumn::ItemCount => json!(self.item_count),
            ReportColumn::Revenue => json!(self.total),
            _ => Value::Null,
        }
    }
}

impl ReportRow for ProductSalesRow {
    fn cell(&self, column: ReportColumn) -> Value {
        match column {
            ReportColumn::ProductName => json!(self.product_name),
            ReportColumn::UnitsSold => json!(self.units_sold),
            ReportColumn::OrderCount => json!(self.order_count),
            ReportColumn::Revenue => json!(self.revenue),
            _ => Value::Null,
        }
    }
}

impl ReportRow for CustomerSalesRow {
    fn cell(&self, column: ReportColumn) -> Value {
        match column {
            ReportColumn::CustomerName => json!(self.customer),
            ReportColumn::CustomerEmail => json!(self.email),
            ReportColumn::OrderCount => json!(self.order_count),
            ReportColumn::Revenue => json!(self.revenue),
            _ => Value::Null,
        }
    }
}

impl ReportRow for ProductReportRow {
    fn cell(&self, column: ReportColumn) -> Value {
        match column {
            ReportColumn::ProductId => json!(self.product_id),
            ReportColumn::ProductName => json!(self.name),
            ReportColumn::Category => json!(self.category),
            ReportColumn::Price => json!(self.price),
            ReportColumn::Stock => json!(self.stock),
            ReportColumn::InventoryValue => json!(self.value),
            _ => Value::Null,
        }
    }
}

fn tabulate<R: ReportRow>(rows: &[R], columns: &[ReportColumn]) -> Vec<Vec<Value>> {
    rows.iter()
        .map(|row| columns.iter().map(|c| row.cell(*c)).collect())
        .collect()
}

/// Result of running a dynamic report
#[derive(Debug, Serialize)]
pub struct DynamicReport {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
    pub total_records: usize,
    pub format: ReportFormat,
    pub parsed: ParsedPrompt,
    #[serde(skip)]
    pub file_stem: String,
}

impl DynamicReport {
    /// Header row followed by the data rows
    pub fn to_csv(&self) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(&self.headers).map_err(csv_error)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(cell_text)).map_err(csv_error)?;
        }
        finish_csv(wtr)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("CSV serialization error: {}", e))
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> AppResult<String> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub orders_by_status: Vec<StatusCount>,
    pub current_month_revenue: Decimal,
    pub previous_month_revenue: Decimal,
    pub revenue_growth_percent: Decimal,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<RecentOrder>,
    pub low_stock_products: Vec<LowStockProduct>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentOrder {
    pub id: Uuid,
    pub username: String,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
}

/// Daily sales data point
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailySalesPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

#[derive(Debug, Serialize)]
pub struct SalesAnalytics {
    pub days: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub daily: Vec<DailySalesPoint>,
}

/// Report range from optional query bounds, defaulting to the current month
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> DateRange {
    let (month_start, month_end) =
        month_bounds(today.year(), today.month()).unwrap_or((today, today));
    DateRange::new(start.unwrap_or(month_start), end.unwrap_or(month_end))
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Orders that count as sales within the range
    pub async fn sales_report(&self, range: &DateRange) -> AppResult<Vec<SalesReportRow>> {
        let rows = sqlx::query_as::<_, SalesReportRow>(&format!(
            r#"
            SELECT
                o.id AS order_id,
                COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS customer,
                o.created_at::date AS date,
                COALESCE((SELECT SUM(oi.quantity) FROM order_items oi WHERE oi.order_id = o.id), 0)::bigint AS item_count,
                o.total_price AS total
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE {}
              AND o.created_at::date BETWEEN $1 AND $2
            ORDER BY o.created_at
            "#,
            REVENUE_FILTER
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Active products with their stock valued at current price
    pub async fn products_report(&self) -> AppResult<Vec<ProductReportRow>> {
        let rows = sqlx::query_as::<_, ProductReportRow>(
            r#"
            SELECT
                p.id AS product_id,
                p.name,
                COALESCE(c.name, '') AS category,
                p.price,
                p.stock,
                p.price * p.stock AS value
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.is_active
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub fn parse(prompt: &str, today: NaiveDate) -> AppResult<ParsedPrompt> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AppError::Validation {
                field: "prompt".to_string(),
                message: "The report prompt cannot be empty".to_string(),
                message_es: "Debe describir el reporte que necesita".to_string(),
            });
        }
        Ok(parse_prompt(prompt, today))
    }

    /// Parse a free-text request and run the matching aggregation
    pub async fn dynamic_report(&self, prompt: &str, today: NaiveDate) -> AppResult<DynamicReport> {
        let parsed = Self::parse(prompt, today)?;
        let columns = parsed.columns();
        let range = parsed.date_range();

        let rows = match (parsed.report_type, parsed.group_by) {
            (ReportType::Products, _) => tabulate(&self.products_report().await?, &columns),
            (ReportType::Sales, Some(GroupBy::Product)) => {
                tabulate(&self.sales_by_product(&range).await?, &columns)
            }
            (ReportType::Sales, Some(GroupBy::Customer)) => {
                tabulate(&self.sales_by_customer(&range).await?, &columns)
            }
            (ReportType::Sales, None) => tabulate(&self.sales_detail(&range).await?, &columns),
        };

        tracing::info!(
            "Dynamic report {:?}/{:?} produced {} rows",
            parsed.report_type,
            parsed.group_by,
            rows.len()
        );

        Ok(DynamicReport {
            title: parsed.title(),
            headers: parsed.headers(),
            total_records: rows.len(),
            rows,
            format: parsed.format,
            file_stem: parsed.file_stem(),
            parsed,
        })
    }

    async fn sales_detail(&self, range: &DateRange) -> AppResult<Vec<OrderDetailRow>> {
        let rows = sqlx::query_as::<_, OrderDetailRow>(&format!(
            r#"
            SELECT
                o.id AS order_id,
                o.created_at::date AS date,
                COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS customer,
                COALESCE(STRING_AGG(oi.product_name, ', ' ORDER BY oi.product_name), '') AS products,
                COALESCE(SUM(oi.quantity), 0)::bigint AS item_count,
                o.total_price AS total
            FROM orders o
            JOIN users u ON u.id = o.user_id
            LEFT JOIN order_items oi ON oi.order_id = o.id
            WHERE {}
              AND o.created_at::date BETWEEN $1 AND $2
            GROUP BY o.id, u.first_name, u.last_name, u.username
            ORDER BY o.created_at
            "#,
            REVENUE_FILTER
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn sales_by_product(&self, range: &DateRange) -> AppResult<Vec<ProductSalesRow>> {
        let rows = sqlx::query_as::<_, ProductSalesRow>(&format!(
            r#"
            SELECT
                oi.product_name,
                SUM(oi.quantity)::bigint AS units_sold,
                COUNT(DISTINCT o.id) AS order_count,
                SUM(oi.price * oi.quantity) AS revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE {}
              AND o.created_at::date BETWEEN $1 AND $2
            GROUP BY oi.product_name
            ORDER BY revenue DESC
            "#,
            REVENUE_FILTER
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn sales_by_customer(&self, range: &DateRange) -> AppResult<Vec<CustomerSalesRow>> {
        let rows = sqlx::query_as::<_, CustomerSalesRow>(&format!(
            r#"
            SELECT
                COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS customer,
                u.email,
                COUNT(o.id) AS order_count,
                SUM(o.total_price) AS revenue
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE {}
              AND o.created_at::date BETWEEN $1 AND $2
            GROUP BY u.id, u.first_name, u.last_name, u.username, u.email
            ORDER BY revenue DESC
            "#,
            REVENUE_FILTER
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Get dashboard metrics
    pub async fn get_dashboard_metrics(&self, today: NaiveDate) -> AppResult<DashboardMetrics> {
        let (total_users, total_products, total_orders): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM orders)
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let total_revenue: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(o.total_price), 0) FROM orders o WHERE {}",
            REVENUE_FILTER
        ))
        .fetch_one(&self.db)
        .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let (month_start, _) =
            month_bounds(today.year(), today.month()).unwrap_or((today, today));
        let previous_start = month_start - Duration::days(1);
        let (previous_start, _) = month_bounds(previous_start.year(), previous_start.month())
            .unwrap_or((previous_start, previous_start));

        let current_month_revenue = self.revenue_between(month_start, today).await?;
        let previous_month_revenue = self
            .revenue_between(previous_start, month_start - Duration::days(1))
            .await?;

        let top_products = sqlx::query_as::<_, TopProduct>(&format!(
            r#"
            SELECT
                oi.product_id,
                oi.product_name AS name,
                SUM(oi.quantity)::bigint AS units_sold,
                SUM(oi.price * oi.quantity) AS revenue
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE {}
            GROUP BY oi.product_id, oi.product_name
            ORDER BY units_sold DESC
            LIMIT 10
            "#,
            REVENUE_FILTER
        ))
        .fetch_all(&self.db)
        .await?;

        let recent_orders = sqlx::query_as::<_, RecentOrder>(
            r#"
            SELECT o.id, u.username, o.status, o.total_price, o.created_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            ORDER BY o.created_at DESC
            LIMIT 10
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let low_stock_products = sqlx::query_as::<_, LowStockProduct>(
            "SELECT id, name, stock FROM products WHERE is_active AND stock < $1 ORDER BY stock, name",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(&self.db)
        .await?;

        Ok(DashboardMetrics {
            total_users,
            total_products,
            total_orders,
            total_revenue,
            orders_by_status,
            revenue_growth_percent: revenue_growth_percent(
                current_month_revenue,
                previous_month_revenue,
            ),
            current_month_revenue,
            previous_month_revenue,
            top_products,
            recent_orders,
            low_stock_products,
        })
    }

    async fn revenue_between(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Decimal> {
        let revenue: Decimal = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(o.total_price), 0) FROM orders o \
             WHERE {} AND o.created_at::date BETWEEN $1 AND $2",
            REVENUE_FILTER
        ))
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await?;
        Ok(revenue)
    }

    /// Daily revenue and order counts for the last `days` days, today included
    pub async fn sales_analytics(&self, days: i64, today: NaiveDate) -> AppResult<SalesAnalytics> {
        if !(1..=MAX_ANALYTICS_DAYS).contains(&days) {
            return Err(AppError::Validation {
                field: "days".to_string(),
                message: format!("days must be between 1 and {}", MAX_ANALYTICS_DAYS),
                message_es: format!("Los días deben estar entre 1 y {}", MAX_ANALYTICS_DAYS),
            });
        }
        let start = today - Duration::days(days - 1);

        let daily = sqlx::query_as::<_, DailySalesPoint>(&format!(
            r#"
            SELECT
                d.day::date AS date,
                COALESCE(SUM(o.total_price), 0) AS revenue,
                COUNT(o.id) AS orders
            FROM generate_series($1::date, $2::date, INTERVAL '1 day') AS d(day)
            LEFT JOIN orders o ON o.created_at::date = d.day::date AND {}
            GROUP BY d.day
            ORDER BY d.day
            "#,
            REVENUE_FILTER
        ))
        .bind(start)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        Ok(SalesAnalytics {
            days,
            start_date: start,
            end_date: today,
            total_revenue: daily.iter().map(|d| d.revenue).sum(),
            total_orders: daily.iter().map(|d| d.orders).sum(),
            daily,
        })
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record).map_err(csv_error)?;
        }
        finish_csv(wtr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_range_is_current_month() {
        let range = resolve_range(None, None, date(2024, 2, 10));
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 2, 29));

        let range = resolve_range(Some(date(2024, 3, 9)), Some(date(2024, 3, 1)), date(2024, 2, 10));
        assert_eq!(range.start, date(2024, 3, 1));
        assert_eq!(range.end, date(2024, 3, 9));
    }

    #[test]
    fn test_tabulate_follows_requested_columns() {
        let rows = vec![ProductSalesRow {
            product_name: "Laptop".to_string(),
            units_sold: 3,
            order_count: 2,
            revenue: Decimal::new(300000, 2),
        }];
        let table = tabulate(
            &rows,
            &[ReportColumn::ProductName, ReportColumn::OrderCount, ReportColumn::Revenue],
        );
        assert_eq!(table, vec![vec![json!("Laptop"), json!(2), json!(Decimal::new(300000, 2))]]);
    }

    #[test]
    fn test_dynamic_csv_has_header_row() {
        let today = date(2024, 10, 20);
        let parsed = parse_prompt("ventas por cliente en csv", today);
        let report = DynamicReport {
            title: parsed.title(),
            headers: parsed.headers(),
            rows: vec![vec![json!("Ana Pérez"), json!("ana@example.com"), json!("120.50")]],
            total_records: 1,
            format: parsed.format,
            file_stem: parsed.file_stem(),
            parsed,
        };
        let csv = report.to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Cliente,Email,Total"));
        assert_eq!(lines.next(), Some("Ana Pérez,ana@example.com,120.50"));
    }

    #[test]
    fn test_export_to_csv_uses_field_names() {
        let rows = vec![ProductReportRow {
            product_id: Uuid::nil(),
            name: "Mouse".to_string(),
            category: "Accesorios".to_string(),
            price: Decimal::new(2500, 2),
            stock: 4,
            value: Decimal::new(10000, 2),
        }];
        let csv = ReportingService::export_to_csv(&rows).unwrap();
        assert!(csv.starts_with("product_id,name,category,price,stock,value"));
        assert!(csv.contains("Mouse,Accesorios,25.00,4,100.00"));
    }
}
