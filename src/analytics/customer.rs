use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analytics::{GroupTotal, RowSet};
use crate::pipeline::AnalysisTable;
use crate::processor::{DashboardError, Value, column::Column};
use crate::warehouse::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerType {
    Repeat,
    #[serde(rename = "One-time")]
    OneTime,
}

impl CustomerType {
    pub fn label(self) -> &'static str {
        match self {
            CustomerType::Repeat => "Repeat",
            CustomerType::OneTime => "One-time",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Repeat" => Some(CustomerType::Repeat),
            "One-time" => Some(CustomerType::OneTime),
            _ => None,
        }
    }

    pub fn of_order_count(distinct_orders: usize) -> Self {
        if distinct_orders > 1 {
            CustomerType::Repeat
        } else {
            CustomerType::OneTime
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classifies every customer appearing in `rows` by distinct order count.
pub fn classify_customers(
    customers: &Column,
    orders: &Column,
    rows: &RowSet,
) -> IndexMap<String, CustomerType> {
    let mut seen: IndexMap<String, HashSet<Value>> = IndexMap::new();
    for i in rows.iter() {
        let Some(customer) = customers.text_at(i) else {
            continue;
        };
        let entry = seen.entry(customer.into_owned()).or_default();
        if let Some(order) = orders.value_at(i) {
            entry.insert(order.into_key());
        }
    }
    seen.into_iter()
        .map(|(customer, orders)| (customer, CustomerType::of_order_count(orders.len())))
        .collect()
}

/// Customer count per class, largest first; empty classes are omitted.
pub fn customer_type_counts(classes: &IndexMap<String, CustomerType>) -> Vec<GroupTotal> {
    let mut counts = vec![
        GroupTotal::new(CustomerType::Repeat.label(), 0.0),
        GroupTotal::new(CustomerType::OneTime.label(), 0.0),
    ];
    for class in classes.values() {
        let slot = match class {
            CustomerType::Repeat => 0,
            CustomerType::OneTime => 1,
        };
        counts[slot].value += 1.0;
    }
    counts.retain(|c| c.value > 0.0);
    counts.sort_by(|a, b| b.value.total_cmp(&a.value));
    counts
}

/// Lifetime value metrics for one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerLifetimeValue {
    pub customer_name: String,
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_orders: usize,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    /// Inclusive of both ends, so a single-day customer has 1
    pub lifespan_days: Option<i64>,
    pub avg_order_value: f64,
    /// Orders per 365 days of lifespan
    pub purchase_frequency: f64,
    /// Two-year projection: `avg_order_value * purchase_frequency * 2`
    pub clv: f64,
}

/// Lifetime value per customer name, in order of first appearance.
pub fn customer_lifetime_value(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<CustomerLifetimeValue>, DashboardError> {
    let names = table.column(Field::CustomerName)?;
    let sales = table.column(Field::Sales)?;
    let profit = table.column(Field::Profit)?;
    let orders = table.order_identity()?;
    let dates = table.column(Field::OrderDate)?;

    struct Acc {
        sales: f64,
        profit: f64,
        orders: HashSet<Value>,
        first: Option<NaiveDate>,
        last: Option<NaiveDate>,
    }

    let mut accs: IndexMap<String, Acc> = IndexMap::new();
    for i in rows.iter() {
        let Some(name) = names.text_at(i) else {
            continue;
        };
        let acc = accs.entry(name.into_owned()).or_insert_with(|| Acc {
            sales: 0.0,
            profit: 0.0,
            orders: HashSet::new(),
            first: None,
            last: None,
        });
        acc.sales += sales.f64_at(i).unwrap_or(0.0);
        acc.profit += profit.f64_at(i).unwrap_or(0.0);
        if let Some(order) = orders.value_at(i) {
            acc.orders.insert(order.into_key());
        }
        if let Some(date) = dates.datetime_at(i).map(|d| d.date()) {
            acc.first = Some(acc.first.map_or(date, |f| f.min(date)));
            acc.last = Some(acc.last.map_or(date, |l| l.max(date)));
        }
    }

    Ok(accs
        .into_iter()
        .map(|(customer_name, acc)| {
            let total_orders = acc.orders.len();
            let lifespan_days = match (acc.first, acc.last) {
                (Some(first), Some(last)) => Some((last - first).num_days() + 1),
                _ => None,
            };
            let avg_order_value = if total_orders == 0 {
                f64::NAN
            } else {
                acc.sales / total_orders as f64
            };
            let purchase_frequency = lifespan_days
                .map_or(f64::NAN, |days| total_orders as f64 / (days as f64 / 365.0));
            CustomerLifetimeValue {
                customer_name,
                total_sales: acc.sales,
                total_profit: acc.profit,
                total_orders,
                first_order: acc.first,
                last_order: acc.last,
                lifespan_days,
                avg_order_value,
                purchase_frequency,
                clv: avg_order_value * purchase_frequency * 2.0,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::table::Table;
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    #[test]
    fn customers_with_several_orders_are_repeat() {
        let customers = strs(&["ann", "ann", "bob", "cy", "cy"]);
        let orders = Column::Int64(vec![Some(1), Some(2), Some(3), Some(4), Some(4)]);
        let classes = classify_customers(&customers, &orders, &RowSet::all(5));

        assert_eq!(classes["ann"], CustomerType::Repeat);
        assert_eq!(classes["bob"], CustomerType::OneTime);
        // two lines of one order is still one order
        assert_eq!(classes["cy"], CustomerType::OneTime);

        let counts = customer_type_counts(&classes);
        assert_eq!(counts[0], GroupTotal::new("One-time", 2.0));
        assert_eq!(counts[1], GroupTotal::new("Repeat", 1.0));
    }

    #[test]
    fn no_rows_classify_no_customers() {
        let customers = strs(&["ann"]);
        let orders = Column::Int64(vec![Some(1)]);
        let classes = classify_customers(&customers, &orders, &RowSet::default());

        assert!(classes.is_empty());
        assert!(customer_type_counts(&classes).is_empty());
    }

    #[test]
    fn lifetime_value_projects_two_years() {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("customer_name".into(), strs(&["ann", "ann"])),
                ("sales".into(), Column::Float64(vec![Some(100.0), Some(300.0)])),
                ("profit".into(), Column::Float64(vec![Some(10.0), Some(-5.0)])),
                ("order_key".into(), Column::Int64(vec![Some(1), Some(2)])),
                ("order_date".into(), strs(&["2016-01-01", "2016-12-30"])),
            ],
        )
        .unwrap();
        let analysis = AnalysisTable::new(t, SchemaMapping::default());
        let clv = customer_lifetime_value(&analysis, &analysis.all_rows()).unwrap();

        assert_eq!(clv.len(), 1);
        let ann = &clv[0];
        assert_eq!(ann.total_orders, 2);
        assert_eq!(ann.lifespan_days, Some(365));
        assert_eq!(ann.avg_order_value, 200.0);
        assert!((ann.purchase_frequency - 2.0).abs() < 1e-12);
        assert!((ann.clv - 800.0).abs() < 1e-9);
    }
}
