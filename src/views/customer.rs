use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::analytics::bucket::{HistogramBin, histogram};
use crate::analytics::customer::{classify_customers, customer_type_counts};
use crate::analytics::{GroupTotal, RowSet, aggregate};
use crate::filter::selection::customer_label_column;
use crate::filter::{CrossFilter, CustomerPage, CustomerSelection, FilterState};
use crate::pipeline::AnalysisTable;
use crate::processor::{AggregateOp, DashboardError, Value};
use crate::views::{FilteredRows, PageView, View, ViewSettings};
use crate::warehouse::Field;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerPerformance {
    pub customer: String,
    pub sales: f64,
    pub profit: f64,
    pub orders: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCustomers {
    pub year: i64,
    pub month: i64,
    pub customers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerPageView {
    pub indicator: String,
    pub filter: FilterState<CustomerSelection>,
    pub segments: View<Vec<GroupTotal>>,
    pub value_distribution: View<Vec<HistogramBin>>,
    pub customer_types: View<Vec<GroupTotal>>,
    pub top_customers: View<Vec<CustomerPerformance>>,
    pub monthly_active: View<Vec<ActiveCustomers>>,
}

pub fn render(
    table: &AnalysisTable,
    filter: &CrossFilter<CustomerPage>,
    settings: &ViewSettings,
) -> PageView<CustomerPageView> {
    if table.is_empty() {
        return PageView::no_data();
    }
    let filtered = FilteredRows::new("customer", filter.rows(table));

    PageView::Ready(CustomerPageView {
        indicator: filter.indicator(),
        filter: filter.state().clone(),
        segments: View::compute("segments", || {
            Ok(aggregate::distinct_count_by_group(
                table.column(Field::Segment)?,
                table.customer_identity()?,
                filtered.get()?,
            ))
        }),
        value_distribution: View::compute("value_distribution", || {
            let per_customer = aggregate::sum_by_group(
                customer_label_column(table)?,
                table.column(Field::Sales)?,
                filtered.get()?,
            );
            let values: Vec<f64> = per_customer.iter().map(|g| g.value).collect();
            Ok(histogram(&values, settings.customer_value_bins))
        }),
        customer_types: View::compute("customer_types", || {
            let classes = classify_customers(
                customer_label_column(table)?,
                table.order_identity()?,
                filtered.get()?,
            );
            Ok(customer_type_counts(&classes))
        }),
        top_customers: View::compute("top_customers", || {
            top_customers(table, filtered.get()?, settings.top_customers)
        }),
        monthly_active: View::compute("monthly_active", || {
            monthly_active(table, filtered.get()?)
        }),
    })
}

fn top_customers(
    table: &AnalysisTable,
    rows: &RowSet,
    n: usize,
) -> Result<Vec<CustomerPerformance>, DashboardError> {
    let result = table
        .query(rows)
        .group_by(Field::CustomerName)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .aggregate_as(Field::OrderKey, AggregateOp::DistinctCount, "orders")
        .order_by_desc("sales")
        .limit(n)
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|mut r| CustomerPerformance {
            customer: r.keys.swap_remove(0),
            sales: r.values[0],
            profit: r.values[1],
            orders: r.values[2],
        })
        .collect())
}

/// Distinct customers with at least one order line per (year, month).
pub fn monthly_active(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<ActiveCustomers>, DashboardError> {
    let years = table.column(Field::Year)?;
    let months = table.column(Field::Month)?;
    let customers = table.customer_identity()?;

    let mut by_month: BTreeMap<(i64, i64), HashSet<Value>> = BTreeMap::new();
    for i in rows.iter() {
        let (Some(y), Some(m), Some(c)) = (years.i64_at(i), months.i64_at(i), customers.value_at(i))
        else {
            continue;
        };
        by_month.entry((y, m)).or_default().insert(c.into_key());
    }
    Ok(by_month
        .into_iter()
        .map(|((year, month), seen)| ActiveCustomers {
            year,
            month,
            customers: seen.len(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::CustomerType;
    use crate::filter::{ClickPoint, CustomerChart};
    use crate::processor::{column::Column, table::Table};
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("customer_id".into(), strs(&["C1", "C1", "C2", "C3", "C3"])),
                ("customer_name".into(), strs(&["Ann", "Ann", "Bob", "Cy", "Cy"])),
                (
                    "segment".into(),
                    strs(&["Consumer", "Consumer", "Corporate", "Consumer", "Consumer"]),
                ),
                (
                    "order_key".into(),
                    Column::Int64(vec![Some(1), Some(2), Some(3), Some(4), Some(4)]),
                ),
                ("year".into(), Column::Int64(vec![Some(2017); 5])),
                ("month".into(), Column::Int64(vec![Some(1), Some(2), Some(1), Some(1), Some(1)])),
                (
                    "sales".into(),
                    Column::Float64(vec![
                        Some(10.0),
                        Some(20.0),
                        Some(100.0),
                        Some(5.0),
                        Some(5.0),
                    ]),
                ),
                (
                    "profit".into(),
                    Column::Float64(vec![Some(1.0), Some(2.0), Some(-10.0), Some(1.0), Some(1.0)]),
                ),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn unfiltered_page_counts_customers() {
        let t = table();
        let page = render(&t, &CrossFilter::new(), &ViewSettings::default());
        let page = page.ready().unwrap();

        assert_eq!(
            page.segments.ready().unwrap(),
            &vec![GroupTotal::new("Consumer", 2.0), GroupTotal::new("Corporate", 1.0)]
        );
        assert_eq!(
            page.customer_types.ready().unwrap(),
            &vec![GroupTotal::new("One-time", 2.0), GroupTotal::new("Repeat", 1.0)]
        );
        let top = page.top_customers.ready().unwrap();
        assert_eq!(top[0].customer, "Bob");
        assert_eq!(top[1].orders, 2.0);
        let bins = page.value_distribution.ready().unwrap();
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn repeat_filter_keeps_only_repeat_customers() {
        let t = table();
        let mut filter = CrossFilter::<CustomerPage>::new();
        filter.click(CustomerChart::RepeatCustomers, &ClickPoint::at_x("Repeat"));
        assert_eq!(
            filter.state(),
            &FilterState::FilteredBy(CustomerSelection::CustomerType(CustomerType::Repeat))
        );

        let page = render(&t, &filter, &ViewSettings::default());
        let page = page.ready().unwrap();
        let top = page.top_customers.ready().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].customer, "Ann");
    }

    #[test]
    fn active_customers_per_month() {
        let t = table();
        let active = monthly_active(&t, &t.all_rows()).unwrap();
        assert_eq!(
            active,
            vec![
                ActiveCustomers { year: 2017, month: 1, customers: 3 },
                ActiveCustomers { year: 2017, month: 2, customers: 1 },
            ]
        );
    }
}
