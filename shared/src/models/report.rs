//! Free-text report requests
//!
//! A prompt such as "ventas agrupadas por producto del 1 al 15 de octubre en
//! excel" is reduced by keyword and pattern matching to a report type, output
//! format, grouping, a handful of column flags and a date range. The backend
//! then runs one of its canned aggregations with those parameters.

use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::DateRange;

const DAY_WORDS: &str = "\\d{1,2}|primero?|uno|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez|once|doce|trece|catorce|quince|dieciséis|dieciseis|diecisiete|dieciocho|diecinueve|veintiuno|veintidós|veintidos|veintitrés|veintitres|veinticuatro|veinticinco|veintiséis|veintiseis|veintisiete|veintiocho|veintinueve|veinte|treinta(?:\\s+y\\s+uno)?";

lazy_static! {
    static ref EXPLICIT_RANGE: Regex = Regex::new(
        r"\bdel?\s+(\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}-\d{2}-\d{2})\s+al?\s+(\d{1,2}[/-]\d{1,2}[/-]\d{4}|\d{4}-\d{2}-\d{2})"
    )
    .unwrap();
    static ref DAY_RANGE: Regex = Regex::new(&format!(
        r"\bdel?\s+({days})\s+(?:de\s+\w+\s+)?al?\s+({days})\s+de\s+(\w+)\b",
        days = DAY_WORDS
    ))
    .unwrap();
    static ref YEAR: Regex = Regex::new(r"\b(20\d{2})\b").unwrap();
    static ref TODAY: Regex = Regex::new(r"\bhoy\b").unwrap();
    static ref YESTERDAY: Regex = Regex::new(r"\bayer\b").unwrap();
}

const MONTHS: [(&str, u32); 12] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "ventas")]
    Sales,
    #[serde(rename = "productos")]
    Products,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
    Excel,
    Csv,
    Json,
}

impl ReportFormat {
    /// Formats served as a file download rather than a JSON preview
    pub fn is_download(&self) -> bool {
        matches!(self, ReportFormat::Excel | ReportFormat::Csv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Product,
    Customer,
}

/// Everything extracted from a report prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPrompt {
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub group_by: Option<GroupBy>,
    pub show_customer_names: bool,
    pub show_product_names: bool,
    pub count_orders: bool,
    pub sum_totals: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ParsedPrompt {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    pub fn title(&self) -> String {
        let span = format!("({} a {})", self.start_date, self.end_date);
        match (self.report_type, self.group_by) {
            (ReportType::Products, _) => "Reporte de Productos".to_string(),
            (ReportType::Sales, Some(GroupBy::Product)) => format!("Ventas por Producto {}", span),
            (ReportType::Sales, Some(GroupBy::Customer)) => format!("Ventas por Cliente {}", span),
            (ReportType::Sales, None) => format!("Reporte de Ventas {}", span),
        }
    }

    /// Columns of the result table, in order
    pub fn columns(&self) -> Vec<ReportColumn> {
        use ReportColumn::*;
        let mut cols = Vec::new();
        match (self.report_type, self.group_by) {
            (ReportType::Products, _) => {
                cols.extend([ProductId, ProductName, Category, Price, Stock, InventoryValue]);
            }
            (ReportType::Sales, Some(GroupBy::Product)) => {
                cols.extend([ProductName, UnitsSold]);
                if self.count_orders {
                    cols.push(OrderCount);
                }
                cols.push(Revenue);
            }
            (ReportType::Sales, Some(GroupBy::Customer)) => {
                cols.extend([CustomerName, CustomerEmail]);
                if self.count_orders {
                    cols.push(OrderCount);
                }
                cols.push(Revenue);
            }
            (ReportType::Sales, None) => {
                cols.extend([OrderId, OrderDate]);
                if self.show_customer_names {
                    cols.push(CustomerName);
                }
                if self.show_product_names {
                    cols.push(ProductList);
                }
                cols.push(ItemCount);
                cols.push(Revenue);
            }
        }
        cols
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns().iter().map(ReportColumn::header).collect()
    }

    pub fn file_stem(&self) -> String {
        match self.report_type {
            ReportType::Products => "reporte_productos".to_string(),
            ReportType::Sales => {
                format!("reporte_ventas_{}_a_{}", self.start_date, self.end_date)
            }
        }
    }
}

/// A column a dynamic report can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportColumn {
    OrderId,
    OrderDate,
    CustomerName,
    CustomerEmail,
    ProductId,
    ProductName,
    ProductList,
    Category,
    Price,
    Stock,
    InventoryValue,
    ItemCount,
    UnitsSold,
    OrderCount,
    Revenue,
}

impl ReportColumn {
    pub fn header(&self) -> &'static str {
        match self {
            ReportColumn::OrderId => "ID Orden",
            ReportColumn::OrderDate => "Fecha",
            ReportColumn::CustomerName => "Cliente",
            ReportColumn::CustomerEmail => "Email",
            ReportColumn::ProductId => "ID",
            ReportColumn::ProductName => "Producto",
            ReportColumn::ProductList => "Productos",
            ReportColumn::Category => "Categoría",
            ReportColumn::Price => "Precio",
            ReportColumn::Stock => "Stock",
            ReportColumn::InventoryValue => "Valor Total",
            ReportColumn::ItemCount => "Artículos",
            ReportColumn::UnitsSold => "Cantidad Vendida",
            ReportColumn::OrderCount => "Cantidad de Compras",
            ReportColumn::Revenue => "Total",
        }
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn day_number(word: &str) -> Option<u32> {
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    let normalized: String = word.split_whitespace().collect::<Vec<_>>().join(" ");
    let n = match normalized.as_str() {
        "primero" | "primer" | "uno" => 1,
        "dos" => 2,
        "tres" => 3,
        "cuatro" => 4,
        "cinco" => 5,
        "seis" => 6,
        "siete" => 7,
        "ocho" => 8,
        "nueve" => 9,
        "diez" => 10,
        "once" => 11,
        "doce" => 12,
        "trece" => 13,
        "catorce" => 14,
        "quince" => 15,
        "dieciséis" | "dieciseis" => 16,
        "diecisiete" => 17,
        "dieciocho" => 18,
        "diecinueve" => 19,
        "veinte" => 20,
        "veintiuno" => 21,
        "veintidós" | "veintidos" => 22,
        "veintitrés" | "veintitres" => 23,
        "veinticuatro" => 24,
        "veinticinco" => 25,
        "veintiséis" | "veintiseis" => 26,
        "veintisiete" => 27,
        "veintiocho" => 28,
        "veintinueve" => 29,
        "treinta" => 30,
        "treinta y uno" => 31,
        _ => return None,
    };
    Some(n)
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS.iter().find(|(m, _)| *m == name).map(|(_, n)| *n)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// First and last day of a month
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next - Duration::days(1)))
}

fn year_in(text: &str, today: NaiveDate) -> i32 {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or_else(|| today.year())
}

fn explicit_range(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let caps = EXPLICIT_RANGE.captures(text)?;
    let start = parse_date(caps.get(1)?.as_str())?;
    let end = parse_date(caps.get(2)?.as_str())?;
    Some((start, end))
}

fn day_range(text: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let caps = DAY_RANGE.captures(text)?;
    let start_day = day_number(caps.get(1)?.as_str().trim())?;
    let end_day = day_number(caps.get(2)?.as_str().trim())?;
    let month = month_number(caps.get(3)?.as_str())?;
    let year = year_in(text, today);
    let start = NaiveDate::from_ymd_opt(year, month, start_day)?;
    let end = NaiveDate::from_ymd_opt(year, month, end_day)?;
    Some((start, end))
}

fn whole_month(text: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let (_, month) = MONTHS.iter().find(|(name, _)| text.contains(name))?;
    month_bounds(year_in(text, today), *month)
}

fn relative_range(text: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if TODAY.is_match(text) {
        return Some((today, today));
    }
    if YESTERDAY.is_match(text) {
        let day = today - Duration::days(1);
        return Some((day, day));
    }
    if text.contains("esta semana") {
        let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        return Some((monday, today));
    }
    if contains_any(text, &["mes pasado", "último mes", "ultimo mes", "mes anterior"]) {
        let last_of_previous = month_bounds(today.year(), today.month())?.0 - Duration::days(1);
        return month_bounds(last_of_previous.year(), last_of_previous.month());
    }
    if text.contains("este año") || text.contains("este ano") {
        let first = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
        return Some((first, today));
    }
    None
}

/// Parse a report prompt relative to `today`
pub fn parse_prompt(prompt: &str, today: NaiveDate) -> ParsedPrompt {
    let text = prompt.to_lowercase();

    let group_by = if contains_any(
        &text,
        &["agrupado por producto", "agrupar por producto", "por producto"],
    ) {
        Some(GroupBy::Product)
    } else if contains_any(
        &text,
        &[
            "agrupado por cliente",
            "agrupar por cliente",
            "por cliente",
            "compras por cliente",
        ],
    ) {
        Some(GroupBy::Customer)
    } else {
        None
    };

    let mentions_inventory = contains_any(&text, &["producto", "inventario", "stock"]);
    let mentions_sales = contains_any(&text, &["venta", "compra", "pedido", "orden", "ingreso"]);
    let report_type = if mentions_inventory && !mentions_sales && group_by.is_none() {
        ReportType::Products
    } else {
        ReportType::Sales
    };

    let format = if contains_any(&text, &["excel", "xlsx", "hoja de cálculo", "hoja de calculo"]) {
        ReportFormat::Excel
    } else if text.contains("csv") {
        ReportFormat::Csv
    } else if contains_any(&text, &["json", "vista previa", "preview"]) {
        ReportFormat::Json
    } else {
        ReportFormat::Pdf
    };

    let show_customer_names = contains_any(
        &text,
        &[
            "nombre del cliente",
            "nombres de clientes",
            "con nombres",
            "mostrar cliente",
        ],
    );
    let show_product_names = contains_any(
        &text,
        &[
            "nombre del producto",
            "nombres de productos",
            "mostrar producto",
            "detalle de producto",
        ],
    );
    let count_orders = contains_any(
        &text,
        &[
            "cantidad de compras",
            "cuantas compras",
            "cuántas compras",
            "número de órdenes",
            "numero de ordenes",
            "contar",
        ],
    );
    let sum_totals = contains_any(&text, &["total", "suma", "monto"]);

    let (start_date, end_date) = explicit_range(&text)
        .or_else(|| day_range(&text, today))
        .or_else(|| whole_month(&text, today))
        .or_else(|| relative_range(&text, today))
        .or_else(|| month_bounds(today.year(), today.month()))
        .unwrap_or((today, today));
    let range = DateRange::new(start_date, end_date);

    ParsedPrompt {
        report_type,
        format,
        group_by,
        show_customer_names,
        show_product_names,
        count_orders,
        sum_totals,
        start_date: range.start,
        end_date: range.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let p = parse_prompt("reporte de ventas", date(2024, 2, 10));
        assert_eq!(p.report_type, ReportType::Sales);
        assert_eq!(p.format, ReportFormat::Pdf);
        assert_eq!(p.group_by, None);
        assert_eq!(p.start_date, date(2024, 2, 1));
        assert_eq!(p.end_date, date(2024, 2, 29));
    }

    #[test]
    fn test_explicit_dates() {
        let p = parse_prompt("ventas del 01/10/2024 al 15/10/2024", date(2025, 1, 1));
        assert_eq!(p.start_date, date(2024, 10, 1));
        assert_eq!(p.end_date, date(2024, 10, 15));

        let p = parse_prompt("ventas de 2024-03-01 a 2024-03-31", date(2025, 1, 1));
        assert_eq!(p.start_date, date(2024, 3, 1));
        assert_eq!(p.end_date, date(2024, 3, 31));
    }

    #[test]
    fn test_day_range_words() {
        let today = date(2024, 11, 20);
        let p = parse_prompt("ventas del uno al quince de octubre", today);
        assert_eq!(p.start_date, date(2024, 10, 1));
        assert_eq!(p.end_date, date(2024, 10, 15));

        let p = parse_prompt("del 5 al treinta y uno de diciembre de 2023", today);
        assert_eq!(p.start_date, date(2023, 12, 5));
        assert_eq!(p.end_date, date(2023, 12, 31));
    }

    #[test]
    fn test_whole_month_with_year() {
        let p = parse_prompt("ventas de febrero 2023 en excel", date(2024, 6, 1));
        assert_eq!(p.format, ReportFormat::Excel);
        assert_eq!(p.start_date, date(2023, 2, 1));
        assert_eq!(p.end_date, date(2023, 2, 28));
    }

    #[test]
    fn test_grouping() {
        let today = date(2024, 6, 1);
        let p = parse_prompt("ventas agrupado por producto de mayo", today);
        assert_eq!(p.group_by, Some(GroupBy::Product));
        assert_eq!(p.report_type, ReportType::Sales);
        assert!(p.title().starts_with("Ventas por Producto (2024-05-01 a 2024-05-31)"));

        let p = parse_prompt("compras por cliente con cantidad de compras", today);
        assert_eq!(p.group_by, Some(GroupBy::Customer));
        assert!(p.count_orders);
        assert_eq!(
            p.headers(),
            vec!["Cliente", "Email", "Cantidad de Compras", "Total"]
        );
    }

    #[test]
    fn test_products_report() {
        let p = parse_prompt("reporte de inventario y stock en excel", date(2024, 6, 1));
        assert_eq!(p.report_type, ReportType::Products);
        assert_eq!(p.title(), "Reporte de Productos");
        assert_eq!(p.file_stem(), "reporte_productos");
    }

    #[test]
    fn test_relative_ranges() {
        let today = date(2024, 3, 13); // Wednesday
        assert_eq!(parse_prompt("ventas de hoy", today).start_date, today);
        let p = parse_prompt("ventas de esta semana", today);
        assert_eq!(p.start_date, date(2024, 3, 11));
        let p = parse_prompt("ventas del mes pasado", today);
        assert_eq!((p.start_date, p.end_date), (date(2024, 2, 1), date(2024, 2, 29)));
    }

    #[test]
    fn test_flags() {
        let p = parse_prompt(
            "ventas con nombre del cliente y nombre del producto, monto total",
            date(2024, 6, 1),
        );
        assert!(p.show_customer_names);
        assert!(p.show_product_names);
        assert!(p.sum_totals);
        assert_eq!(
            p.headers(),
            vec!["ID Orden", "Fecha", "Cliente", "Productos", "Artículos", "Total"]
        );
    }

    #[test]
    fn test_invalid_day_falls_back_to_month() {
        let p = parse_prompt("del 30 al 31 de febrero", date(2024, 6, 1));
        assert_eq!(p.start_date, date(2024, 2, 1));
        assert_eq!(p.end_date, date(2024, 2, 29));
    }
}
