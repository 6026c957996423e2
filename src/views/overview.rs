use std::collections::BTreeMap;

use serde::Serialize;

use crate::analytics::stats::{CorrelationMatrix, correlation_matrix, rolling_mean_centered};
use crate::analytics::{GroupTotal, RowSet, aggregate};
use crate::pipeline::AnalysisTable;
use crate::processor::{AggregateOp, DashboardError};
use crate::views::{PageView, View, ViewSettings};
use crate::warehouse::Field;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_orders: usize,
    /// Mean discount as a percentage
    pub avg_discount_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i64,
    pub month: i64,
    pub sales: f64,
    /// Centered rolling mean; NaN (null in JSON) near the ends
    pub rolling_mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPerformance {
    pub segment: String,
    pub sales: f64,
    pub profit: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPoint {
    pub product: String,
    pub category: Option<String>,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewPageView {
    pub kpis: View<Kpis>,
    pub monthly_trend: View<Vec<TrendPoint>>,
    pub category_sales: View<Vec<GroupTotal>>,
    pub top_products: View<Vec<GroupTotal>>,
    pub segments: View<Vec<SegmentPerformance>>,
    pub correlation: View<CorrelationMatrix>,
    pub product_scatter: View<Vec<ProductPoint>>,
}

pub fn render(table: &AnalysisTable, settings: &ViewSettings) -> PageView<OverviewPageView> {
    if table.is_empty() {
        return PageView::no_data();
    }
    let rows = table.all_rows();
    PageView::Ready(OverviewPageView {
        kpis: View::compute("kpis", || kpis(table, &rows)),
        monthly_trend: View::compute("monthly_trend", || {
            monthly_trend(table, &rows, settings.trend_window)
        }),
        category_sales: View::compute("category_sales", || {
            Ok(aggregate::sum_by_group(
                table.column(Field::Category)?,
                table.column(Field::Sales)?,
                &rows,
            ))
        }),
        top_products: View::compute("top_products", || {
            let totals = aggregate::sum_by_group(
                table.column(Field::ProductName)?,
                table.column(Field::Sales)?,
                &rows,
            );
            Ok(aggregate::top_n(totals, settings.top_products))
        }),
        segments: View::compute("segments", || segments(table, &rows)),
        correlation: View::compute("correlation", || {
            let mut columns = Vec::with_capacity(Field::MEASURES.len());
            for field in Field::MEASURES {
                columns.push((table.schema().column(field), table.column(field)?));
            }
            Ok(correlation_matrix(&columns, &rows))
        }),
        product_scatter: View::compute("product_scatter", || product_scatter(table, &rows)),
    })
}

pub fn kpis(table: &AnalysisTable, rows: &RowSet) -> Result<Kpis, DashboardError> {
    Ok(Kpis {
        total_sales: aggregate::sum(table.column(Field::Sales)?, rows),
        total_profit: aggregate::sum(table.column(Field::Profit)?, rows),
        total_orders: aggregate::distinct_count(table.order_identity()?, rows),
        avg_discount_pct: aggregate::mean(table.column(Field::Discount)?, rows) * 100.0,
    })
}

/// Sales per (year, month) in calendar order with a centered rolling mean.
pub fn monthly_trend(
    table: &AnalysisTable,
    rows: &RowSet,
    window: usize,
) -> Result<Vec<TrendPoint>, DashboardError> {
    let years = table.column(Field::Year)?;
    let months = table.column(Field::Month)?;
    let sales = table.column(Field::Sales)?;

    let mut by_month: BTreeMap<(i64, i64), f64> = BTreeMap::new();
    for i in rows.iter() {
        let (Some(y), Some(m)) = (years.i64_at(i), months.i64_at(i)) else {
            continue;
        };
        *by_month.entry((y, m)).or_default() += sales.f64_at(i).unwrap_or(0.0);
    }

    let totals: Vec<f64> = by_month.values().copied().collect();
    let rolling = rolling_mean_centered(&totals, window);
    Ok(by_month
        .into_iter()
        .zip(rolling)
        .map(|(((year, month), sales), rolling_mean)| TrendPoint {
            year,
            month,
            sales,
            rolling_mean,
        })
        .collect())
}

fn segments(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<SegmentPerformance>, DashboardError> {
    let result = table
        .query(rows)
        .group_by(Field::Segment)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .aggregate_as(Field::Quantity, AggregateOp::Sum, "quantity")
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|mut r| SegmentPerformance {
            segment: r.keys.swap_remove(0),
            sales: r.values[0],
            profit: r.values[1],
            quantity: r.values[2],
        })
        .collect())
}

fn product_scatter(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<ProductPoint>, DashboardError> {
    let products = table.column(Field::ProductName)?;
    let categories = aggregate::first_by_group(products, table.column(Field::Category)?, rows);
    let result = table
        .query(rows)
        .group_by(Field::ProductName)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|mut r| {
            let product = r.keys.swap_remove(0);
            ProductPoint {
                category: categories.get(&product).cloned(),
                product,
                sales: r.values[0],
                profit: r.values[1],
            }
        })
        .collect())
}
