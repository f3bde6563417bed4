//! Dynamic report prompt parser tests

use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;
use shared::{month_bounds, parse_prompt, GroupBy, ReportColumn, ReportFormat, ReportType};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today_strategy() -> impl Strategy<Value = NaiveDate> {
    (2020i32..=2030, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| date(y, m, d))
}

fn free_text_strategy() -> impl Strategy<Value = String> {
    "[a-záéíóúñ0-9/ -]{0,60}"
}

proptest! {
    /// Property: any prompt yields an ordered date range and a non-empty
    /// column list
    #[test]
    fn test_parser_total(prompt in free_text_strategy(), today in today_strategy()) {
        let parsed = parse_prompt(&prompt, today);
        prop_assert!(parsed.start_date <= parsed.end_date);
        prop_assert!(!parsed.columns().is_empty());
        prop_assert_eq!(parsed.headers().len(), parsed.columns().len());
    }

    /// Property: a prompt with no date words covers the current month
    #[test]
    fn test_default_is_current_month(today in today_strategy()) {
        let parsed = parse_prompt("reporte de ventas", today);
        let (first, last) = month_bounds(today.year(), today.month()).unwrap();
        prop_assert_eq!(parsed.start_date, first);
        prop_assert_eq!(parsed.end_date, last);
    }

    /// Property: explicit numeric ranges are honoured, in either order
    #[test]
    fn test_explicit_range(a in 1u32..=28, b in 1u32..=28, month in 1u32..=12) {
        let prompt = format!("ventas del {:02}/{:02}/2024 al {:02}/{:02}/2024", a, month, b, month);
        let parsed = parse_prompt(&prompt, date(2025, 1, 1));
        prop_assert_eq!(parsed.start_date, date(2024, month, a.min(b)));
        prop_assert_eq!(parsed.end_date, date(2024, month, a.max(b)));
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn test_formats() {
        let today = date(2024, 6, 1);
        assert_eq!(parse_prompt("ventas en excel", today).format, ReportFormat::Excel);
        assert_eq!(parse_prompt("ventas en csv", today).format, ReportFormat::Csv);
        assert_eq!(parse_prompt("vista previa de ventas", today).format, ReportFormat::Json);
        assert_eq!(parse_prompt("ventas", today).format, ReportFormat::Pdf);
    }

    #[test]
    fn test_download_formats() {
        assert!(ReportFormat::Excel.is_download());
        assert!(ReportFormat::Csv.is_download());
        assert!(!ReportFormat::Json.is_download());
        assert!(!ReportFormat::Pdf.is_download());
    }
}

#[cfg(test)]
mod shape_tests {
    use super::*;

    #[test]
    fn test_sales_by_product_columns() {
        let p = parse_prompt("ventas por producto de octubre", date(2024, 11, 5));
        assert_eq!(p.report_type, ReportType::Sales);
        assert_eq!(p.group_by, Some(GroupBy::Product));
        assert_eq!(
            p.columns(),
            vec![ReportColumn::ProductName, ReportColumn::UnitsSold, ReportColumn::Revenue]
        );
        assert_eq!(p.start_date, date(2024, 10, 1));
        assert_eq!(p.end_date, date(2024, 10, 31));
        assert_eq!(p.file_stem(), "reporte_ventas_2024-10-01_a_2024-10-31");
    }

    #[test]
    fn test_inventory_prompt_is_products_report() {
        let p = parse_prompt("inventario de productos con stock", date(2024, 11, 5));
        assert_eq!(p.report_type, ReportType::Products);
        assert_eq!(p.headers()[0], "ID");
    }

    #[test]
    fn test_sales_words_win_over_inventory() {
        let p = parse_prompt("ventas de productos", date(2024, 11, 5));
        assert_eq!(p.report_type, ReportType::Sales);
    }

    #[test]
    fn test_yesterday() {
        let p = parse_prompt("ventas de ayer", date(2024, 3, 1));
        assert_eq!((p.start_date, p.end_date), (date(2024, 2, 29), date(2024, 2, 29)));
    }

    #[test]
    fn test_last_month_across_year() {
        let p = parse_prompt("ventas del mes pasado", date(2024, 1, 15));
        assert_eq!((p.start_date, p.end_date), (date(2023, 12, 1), date(2023, 12, 31)));
    }

    #[test]
    fn test_this_year() {
        let p = parse_prompt("ventas de este año", date(2024, 5, 20));
        assert_eq!((p.start_date, p.end_date), (date(2024, 1, 1), date(2024, 5, 20)));
    }
}
