use indexmap::IndexMap;
use serde::Serialize;

use crate::analytics::{MultiDimensionalResult, RowSet, aggregate};
use crate::pipeline::AnalysisTable;
use crate::processor::{AggregateOp, DashboardError, Value};
use crate::warehouse::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Meteorological season of a 1-based month.
    pub fn of_month(month: i64) -> Option<Season> {
        match month {
            12 | 1 | 2 => Some(Season::Winter),
            3..=5 => Some(Season::Spring),
            6..=8 => Some(Season::Summer),
            9..=11 => Some(Season::Fall),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalRow {
    pub season: Season,
    pub category: String,
    pub sales: f64,
    pub profit: f64,
    pub quantity: f64,
}

/// Sales, profit and quantity per (season, category).
pub fn seasonal_analysis(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<SeasonalRow>, DashboardError> {
    let month = table.column(Field::Month)?;
    let category = table.column(Field::Category)?;
    let sales = table.column(Field::Sales)?;
    let profit = table.column(Field::Profit)?;
    let quantity = table.column(Field::Quantity)?;

    let mut groups: IndexMap<(Season, String), (f64, f64, f64)> = IndexMap::new();
    for i in rows.iter() {
        let (Some(season), Some(cat)) = (
            month.i64_at(i).and_then(Season::of_month),
            category.text_at(i),
        ) else {
            continue;
        };
        let acc = groups.entry((season, cat.into_owned())).or_default();
        acc.0 += sales.f64_at(i).unwrap_or(0.0);
        acc.1 += profit.f64_at(i).unwrap_or(0.0);
        acc.2 += quantity.f64_at(i).unwrap_or(0.0);
    }

    Ok(groups
        .into_iter()
        .map(|((season, category), (sales, profit, quantity))| SeasonalRow {
            season,
            category,
            sales,
            profit,
            quantity,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductPair {
    pub first: String,
    pub second: String,
    pub count: usize,
}

/// The `limit` most frequent product pairs bought within one order.
///
/// Every 2-combination of an order's lines counts once, with the pair's names
/// sorted. Ties keep the order in which the pair was first seen.
pub fn market_basket(
    table: &AnalysisTable,
    rows: &RowSet,
    limit: usize,
) -> Result<Vec<ProductPair>, DashboardError> {
    // baskets are business orders; one order_id may span several order keys
    let orders = table
        .column(Field::OrderId)
        .or_else(|_| table.column(Field::OrderKey))?;
    let products = table.column(Field::ProductName)?;

    let mut baskets: IndexMap<Value, Vec<String>> = IndexMap::new();
    for i in rows.iter() {
        let (Some(order), Some(product)) = (orders.value_at(i), products.text_at(i)) else {
            continue;
        };
        baskets
            .entry(order.into_key())
            .or_default()
            .push(product.into_owned());
    }

    let mut pair_counts: IndexMap<(String, String), usize> = IndexMap::new();
    for basket in baskets.values() {
        for (a, left) in basket.iter().enumerate() {
            for right in &basket[a + 1..] {
                let key = if left <= right {
                    (left.clone(), right.clone())
                } else {
                    (right.clone(), left.clone())
                };
                *pair_counts.entry(key).or_default() += 1;
            }
        }
    }

    let mut pairs: Vec<ProductPair> = pair_counts
        .into_iter()
        .map(|((first, second), count)| ProductPair {
            first,
            second,
            count,
        })
        .collect();
    pairs.sort_by(|a, b| b.count.cmp(&a.count));
    pairs.truncate(limit);
    Ok(pairs)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiGrowth {
    pub current: f64,
    pub previous: f64,
    /// Percent change; 0 when the previous value is not positive
    pub growth: f64,
}

impl KpiGrowth {
    fn new(current: f64, previous: f64) -> Self {
        let growth = if previous > 0.0 {
            (current - previous) / previous * 100.0
        } else {
            0.0
        };
        KpiGrowth {
            current,
            previous,
            growth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearOverYear {
    pub year: i64,
    pub previous_year: i64,
    pub sales: KpiGrowth,
    pub profit: KpiGrowth,
    pub customers: KpiGrowth,
    pub orders: KpiGrowth,
}

/// KPIs of the latest year against the year before. `None` without any year.
pub fn year_over_year(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Option<YearOverYear>, DashboardError> {
    let years = table.column(Field::Year)?;
    let Some(year) = rows.iter().filter_map(|i| years.i64_at(i)).max() else {
        return Ok(None);
    };
    let previous_year = year - 1;
    let current_rows = rows.retain(|i| years.i64_at(i) == Some(year));
    let previous_rows = rows.retain(|i| years.i64_at(i) == Some(previous_year));

    let sales = table.column(Field::Sales)?;
    let profit = table.column(Field::Profit)?;
    let customers = table.customer_identity()?;
    let orders = table.order_identity()?;

    let (cur, prev) = (&current_rows, &previous_rows);
    Ok(Some(YearOverYear {
        year,
        previous_year,
        sales: KpiGrowth::new(aggregate::sum(sales, cur), aggregate::sum(sales, prev)),
        profit: KpiGrowth::new(aggregate::sum(profit, cur), aggregate::sum(profit, prev)),
        customers: KpiGrowth::new(
            aggregate::distinct_count(customers, cur) as f64,
            aggregate::distinct_count(customers, prev) as f64,
        ),
        orders: KpiGrowth::new(
            aggregate::distinct_count(orders, cur) as f64,
            aggregate::distinct_count(orders, prev) as f64,
        ),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummaries {
    pub sales_summary: MultiDimensionalResult,
    pub customer_summary: MultiDimensionalResult,
    pub product_performance: MultiDimensionalResult,
    pub regional_analysis: MultiDimensionalResult,
}

/// Flat grouped summaries for use outside the dashboard.
pub fn export_summaries(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<ExportSummaries, DashboardError> {
    Ok(ExportSummaries {
        sales_summary: table
            .query(rows)
            .group_by_multi(vec![Field::Year, Field::Month, Field::Category])
            .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
            .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
            .aggregate_as(Field::Quantity, AggregateOp::Sum, "quantity")
            .execute()?,
        customer_summary: table
            .query(rows)
            .group_by_multi(vec![Field::CustomerName, Field::Segment])
            .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
            .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
            .aggregate_as(Field::OrderKey, AggregateOp::DistinctCount, "orders")
            .execute()?,
        product_performance: table
            .query(rows)
            .group_by_multi(vec![Field::ProductName, Field::Category, Field::SubCategory])
            .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
            .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
            .aggregate_as(Field::Quantity, AggregateOp::Sum, "quantity")
            .execute()?,
        regional_analysis: table
            .query(rows)
            .group_by_multi(vec![Field::Region, Field::State, Field::City])
            .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
            .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
            .aggregate_as(Field::OrderKey, AggregateOp::DistinctCount, "orders")
            .execute()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{column::Column, table::Table};
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                (
                    "order_key".into(),
                    Column::Int64(vec![Some(1), Some(1), Some(1), Some(2), Some(2)]),
                ),
                ("product_name".into(), strs(&["pen", "ink", "pad", "ink", "pen"])),
                ("category".into(), strs(&["A", "A", "B", "A", "A"])),
                ("month".into(), Column::Int64(vec![Some(1), Some(1), Some(7), Some(12), Some(4)])),
                (
                    "year".into(),
                    Column::Int64(vec![Some(2016), Some(2016), Some(2016), Some(2017), Some(2017)]),
                ),
                (
                    "customer_key".into(),
                    Column::Int64(vec![Some(1), Some(1), Some(1), Some(2), Some(3)]),
                ),
                (
                    "sales".into(),
                    Column::Float64(vec![
                        Some(10.0),
                        Some(20.0),
                        Some(30.0),
                        Some(40.0),
                        Some(50.0),
                    ]),
                ),
                (
                    "profit".into(),
                    Column::Float64(vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]),
                ),
                (
                    "quantity".into(),
                    Column::Int64(vec![Some(1), Some(1), Some(1), Some(1), Some(1)]),
                ),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn seasons_follow_meteorological_months() {
        assert_eq!(Season::of_month(12), Some(Season::Winter));
        assert_eq!(Season::of_month(3), Some(Season::Spring));
        assert_eq!(Season::of_month(13), None);

        let t = table();
        let rows = seasonal_analysis(&t, &t.all_rows()).unwrap();
        let winter_a = rows
            .iter()
            .find(|r| r.season == Season::Winter && r.category == "A")
            .unwrap();
        assert_eq!(winter_a.sales, 70.0);
        assert_eq!(winter_a.quantity, 3.0);
    }

    #[test]
    fn basket_pairs_are_sorted_and_counted() {
        let t = table();
        let pairs = market_basket(&t, &t.all_rows(), 20).unwrap();
        assert_eq!(pairs[0], ProductPair { first: "ink".into(), second: "pen".into(), count: 2 });
        assert_eq!(pairs.len(), 3);
        assert_eq!(market_basket(&t, &t.all_rows(), 1).unwrap().len(), 1);
    }

    #[test]
    fn baskets_group_on_order_id_across_order_keys() {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("order_key".into(), Column::Int64(vec![Some(1), Some(2), Some(3)])),
                ("order_id".into(), strs(&["OR-1", "OR-1", "OR-2"])),
                ("product_name".into(), strs(&["pen", "ink", "pad"])),
            ],
        )
        .unwrap();
        let t = AnalysisTable::new(t, SchemaMapping::default());

        let pairs = market_basket(&t, &t.all_rows(), 20).unwrap();
        assert_eq!(
            pairs,
            vec![ProductPair {
                first: "ink".into(),
                second: "pen".into(),
                count: 1
            }]
        );
    }

    #[test]
    fn year_over_year_compares_latest_two_years() {
        let t = table();
        let yoy = year_over_year(&t, &t.all_rows()).unwrap().unwrap();
        assert_eq!(yoy.year, 2017);
        assert_eq!(yoy.sales.current, 90.0);
        assert_eq!(yoy.sales.previous, 60.0);
        assert_eq!(yoy.sales.growth, 50.0);
        assert_eq!(yoy.customers.current, 2.0);
        assert_eq!(yoy.orders.growth, 0.0);
    }

    #[test]
    fn growth_is_zero_without_previous_year() {
        let g = KpiGrowth::new(10.0, 0.0);
        assert_eq!(g.growth, 0.0);
        let t = table();
        assert!(year_over_year(&t, &RowSet::default()).unwrap().is_none());
    }
}
