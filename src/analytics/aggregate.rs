use std::collections::HashSet;

use indexmap::IndexMap;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;

use crate::analytics::{GroupTotal, RowSet};
use crate::helpers::simd_helpers::{min_max_f64, sum_f64};
use crate::pipeline::AnalysisTable;
use crate::processor::{AggregateOp, DashboardError, Value, column::Column};
use crate::warehouse::Field;

/// Non-null numeric values of `column` at `rows`, in row order.
pub fn gather_f64(column: &Column, rows: &RowSet) -> Vec<f64> {
    rows.iter().filter_map(|i| column.f64_at(i)).collect()
}

pub fn sum(column: &Column, rows: &RowSet) -> f64 {
    sum_f64(&gather_f64(column, rows))
}

/// Mean of the non-null values; 0 when there are none.
pub fn mean(column: &Column, rows: &RowSet) -> f64 {
    let values = gather_f64(column, rows);
    if values.is_empty() {
        return 0.0;
    }
    sum_f64(&values) / values.len() as f64
}

pub fn distinct_count(column: &Column, rows: &RowSet) -> usize {
    rows.iter()
        .filter_map(|i| column.value_at(i))
        .map(Value::into_key)
        .collect::<HashSet<_>>()
        .len()
}

/// Sums `measure` per distinct value of `keys`.
///
/// Rows with a null key are skipped; null measures contribute nothing but the
/// group still appears. Groups are in order of first appearance.
pub fn sum_by_group(keys: &Column, measure: &Column, rows: &RowSet) -> Vec<GroupTotal> {
    let mut groups: IndexMap<String, f64> = IndexMap::new();
    for i in rows.iter() {
        let Some(key) = keys.text_at(i) else {
            continue;
        };
        let value = measure.f64_at(i).unwrap_or(0.0);
        match groups.get_mut(&*key) {
            Some(total) => *total += value,
            None => {
                groups.insert(key.into_owned(), value);
            }
        }
    }
    groups
        .into_iter()
        .map(|(key, value)| GroupTotal { key, value })
        .collect()
}

/// Distinct non-null values of `counted` per distinct value of `keys`.
pub fn distinct_count_by_group(keys: &Column, counted: &Column, rows: &RowSet) -> Vec<GroupTotal> {
    let mut groups: IndexMap<String, HashSet<Value>> = IndexMap::new();
    for i in rows.iter() {
        let Some(key) = keys.text_at(i) else {
            continue;
        };
        let seen = groups.entry(key.into_owned()).or_default();
        if let Some(v) = counted.value_at(i) {
            seen.insert(v.into_key());
        }
    }
    groups
        .into_iter()
        .map(|(key, seen)| GroupTotal::new(key, seen.len() as f64))
        .collect()
}

/// First non-null value of `values` per distinct value of `keys`.
pub fn first_by_group(keys: &Column, values: &Column, rows: &RowSet) -> IndexMap<String, String> {
    let mut firsts: IndexMap<String, String> = IndexMap::new();
    for i in rows.iter() {
        let Some(key) = keys.text_at(i) else {
            continue;
        };
        if firsts.contains_key(&*key) {
            continue;
        }
        if let Some(v) = values.text_at(i) {
            firsts.insert(key.into_owned(), v.into_owned());
        }
    }
    firsts
}

/// The `n` largest totals, ties kept in input order.
pub fn top_n(mut groups: Vec<GroupTotal>, n: usize) -> Vec<GroupTotal> {
    groups.sort_by(|a, b| b.value.total_cmp(&a.value));
    groups.truncate(n);
    groups
}

/// The `n` smallest totals, ties kept in input order.
pub fn bottom_n(mut groups: Vec<GroupTotal>, n: usize) -> Vec<GroupTotal> {
    groups.sort_by(|a, b| a.value.total_cmp(&b.value));
    groups.truncate(n);
    groups
}

/// Applies one aggregate to the given rows of a column.
///
/// Sum and Count of nothing are 0; Mean, Min and Max of nothing are NaN.
pub fn aggregate_rows(column: &Column, op: AggregateOp, rows: &[usize]) -> f64 {
    match op {
        AggregateOp::Count => rows.iter().filter(|&&i| !column.is_null(i)).count() as f64,
        AggregateOp::DistinctCount => rows
            .iter()
            .filter_map(|&i| column.value_at(i))
            .map(Value::into_key)
            .collect::<HashSet<_>>()
            .len() as f64,
        AggregateOp::Sum | AggregateOp::Mean | AggregateOp::Min | AggregateOp::Max => {
            let values: Vec<f64> = rows.iter().filter_map(|&i| column.f64_at(i)).collect();
            match op {
                AggregateOp::Sum => sum_f64(&values),
                AggregateOp::Mean if values.is_empty() => f64::NAN,
                AggregateOp::Mean => sum_f64(&values) / values.len() as f64,
                AggregateOp::Min => min_max_f64(&values).map_or(f64::NAN, |(lo, _)| lo),
                _ => min_max_f64(&values).map_or(f64::NAN, |(_, hi)| hi),
            }
        }
    }
}

/// One group of a multi-dimensional result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    /// `keys[i]` corresponds to `dimensions[i]`
    pub keys: Vec<String>,
    /// `values[j]` corresponds to `measures[j]`
    pub values: Vec<f64>,
}

/// Represents a multi-dimensional aggregation result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiDimensionalResult {
    /// The dimensions used for grouping (e.g., ["region", "state", "city"])
    pub dimensions: Vec<String>,
    /// The aggregations computed (e.g., ["sales", "orders"])
    pub measures: Vec<String>,
    pub rows: Vec<GroupRow>,
}

impl MultiDimensionalResult {
    pub fn measure_index(&self, name: &str) -> Option<usize> {
        self.measures.iter().position(|m| m == name)
    }

    pub fn value(&self, row: &GroupRow, name: &str) -> Option<f64> {
        self.measure_index(name).and_then(|j| row.values.get(j).copied())
    }
}

/// Builder for grouped aggregations over several dimensions and measures.
///
/// Columns are resolved when [`GroupQuery::execute`] runs, so a missing field
/// surfaces as a [`DashboardError::MissingColumn`] at that point.
#[derive(Debug, Clone)]
pub struct GroupQuery<'a> {
    table: &'a AnalysisTable,
    rows: &'a RowSet,
    group_by_fields: Vec<Field>,
    aggregations: Vec<(Field, AggregateOp, Option<String>)>,
    order_by: Option<String>,
    limit: Option<usize>,
}

impl<'a> GroupQuery<'a> {
    pub fn new(table: &'a AnalysisTable, rows: &'a RowSet) -> Self {
        GroupQuery {
            table,
            rows,
            group_by_fields: Vec::new(),
            aggregations: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add a single group-by field
    pub fn group_by(mut self, field: Field) -> Self {
        self.group_by_fields.push(field);
        self
    }

    /// Add multiple group-by fields for multi-dimensional analysis
    pub fn group_by_multi(mut self, fields: Vec<Field>) -> Self {
        self.group_by_fields.extend(fields);
        self
    }

    /// Add an aggregation named after the field's column
    pub fn aggregate(mut self, field: Field, op: AggregateOp) -> Self {
        self.aggregations.push((field, op, None));
        self
    }

    /// Add an aggregation with a custom alias
    pub fn aggregate_as(mut self, field: Field, op: AggregateOp, alias: &str) -> Self {
        self.aggregations.push((field, op, Some(alias.to_string())));
        self
    }

    /// Sort groups by a measure, largest first
    pub fn order_by_desc(mut self, measure: &str) -> Self {
        self.order_by = Some(measure.to_string());
        self
    }

    /// Limit number of groups
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn measure_name(&self, field: Field, op: AggregateOp, alias: &Option<String>) -> String {
        alias
            .clone()
            .unwrap_or_else(|| self.table.schema().column(field).to_string())
            .to_lowercase()
            .replace(' ', "_")
            + match (alias, op) {
                (Some(_), _) | (None, AggregateOp::Sum) => "",
                (None, AggregateOp::Count) => "_count",
                (None, AggregateOp::DistinctCount) => "_nunique",
                (None, AggregateOp::Mean) => "_mean",
                (None, AggregateOp::Min) => "_min",
                (None, AggregateOp::Max) => "_max",
            }
    }

    /// Execute the grouped query
    pub fn execute(self) -> Result<MultiDimensionalResult, DashboardError> {
        let group_cols: Vec<&Column> = self
            .group_by_fields
            .iter()
            .map(|f| self.table.resolve(*f))
            .collect::<Result<_, _>>()?;
        let measure_cols: Vec<(&Column, AggregateOp)> = self
            .aggregations
            .iter()
            .map(|(f, op, _)| self.table.resolve(*f).map(|c| (c, *op)))
            .collect::<Result<_, _>>()?;

        // Create multi-dimensional groups
        let mut groups: IndexMap<Vec<String>, Vec<usize>> = IndexMap::new();
        'rows: for row_idx in self.rows.iter() {
            let mut group_key = Vec::with_capacity(group_cols.len());
            for col in &group_cols {
                match col.text_at(row_idx) {
                    Some(key) => group_key.push(key.into_owned()),
                    None => continue 'rows,
                }
            }
            groups.entry(group_key).or_default().push(row_idx);
        }

        // Apply aggregations to each group
        let mut rows: Vec<GroupRow> = groups
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(keys, group_rows)| GroupRow {
                keys,
                values: measure_cols
                    .iter()
                    .map(|(col, op)| aggregate_rows(col, *op, &group_rows))
                    .collect(),
            })
            .collect();

        let measures: Vec<String> = self
            .aggregations
            .iter()
            .map(|(f, op, alias)| self.measure_name(*f, *op, alias))
            .collect();

        if let Some(order) = &self.order_by {
            let j = measures
                .iter()
                .position(|m| m == order)
                .ok_or_else(|| DashboardError::MissingColumn(order.clone()))?;
            rows.sort_by(|a, b| b.values[j].total_cmp(&a.values[j]));
        }
        if let Some(n) = self.limit {
            rows.truncate(n);
        }

        Ok(MultiDimensionalResult {
            dimensions: self
                .group_by_fields
                .iter()
                .map(|f| self.table.schema().column(*f).to_string())
                .collect(),
            measures,
            rows,
        })
    }
}

impl AnalysisTable {
    pub fn query<'a>(&'a self, rows: &'a RowSet) -> GroupQuery<'a> {
        GroupQuery::new(self, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::table::Table;
    use crate::warehouse::SchemaMapping;

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                (
                    "category".into(),
                    Column::Str(vec![Some("A".into()), Some("A".into()), Some("B".into()), None]),
                ),
                (
                    "region".into(),
                    Column::Str(vec![
                        Some("West".into()),
                        Some("East".into()),
                        Some("West".into()),
                        Some("West".into()),
                    ]),
                ),
                (
                    "sales".into(),
                    Column::Float64(vec![Some(100.0), Some(200.0), Some(300.0), Some(50.0)]),
                ),
                ("order_key".into(), Column::Int64(vec![Some(1), Some(1), Some(2), Some(3)])),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn sum_by_group_skips_null_keys_in_first_appearance_order() {
        let t = table();
        let rows = t.all_rows();
        let groups = sum_by_group(
            t.column(Field::Category).unwrap(),
            t.column(Field::Sales).unwrap(),
            &rows,
        );
        assert_eq!(groups, vec![GroupTotal::new("A", 300.0), GroupTotal::new("B", 300.0)]);
    }

    #[test]
    fn scalar_aggregates_handle_empty_rows() {
        let t = table();
        let sales = t.column(Field::Sales).unwrap();
        assert_eq!(sum(sales, &RowSet::default()), 0.0);
        assert_eq!(mean(sales, &RowSet::default()), 0.0);
        assert_eq!(distinct_count(t.column(Field::OrderKey).unwrap(), &t.all_rows()), 3);
    }

    #[test]
    fn top_n_is_stable_for_ties() {
        let groups = vec![
            GroupTotal::new("x", 1.0),
            GroupTotal::new("y", 5.0),
            GroupTotal::new("z", 5.0),
            GroupTotal::new("w", 3.0),
        ];
        let top = top_n(groups.clone(), 2);
        assert_eq!(top.iter().map(|g| g.key.as_str()).collect::<Vec<_>>(), ["y", "z"]);
        let bottom = bottom_n(groups, 2);
        assert_eq!(bottom.iter().map(|g| g.key.as_str()).collect::<Vec<_>>(), ["x", "w"]);
    }

    #[test]
    fn test_multi_dimensional_query() {
        let t = table();
        let rows = t.all_rows();
        let cube = t
            .query(&rows)
            .group_by_multi(vec![Field::Region, Field::Category])
            .aggregate(Field::Sales, AggregateOp::Sum)
            .aggregate_as(Field::OrderKey, AggregateOp::DistinctCount, "orders")
            .order_by_desc("sales")
            .execute()
            .unwrap();

        assert_eq!(cube.dimensions, vec!["region", "category"]);
        assert_eq!(cube.measures, vec!["sales", "orders"]);
        // the row with a null category is dropped
        assert_eq!(cube.rows.len(), 3);
        assert_eq!(cube.rows[0].keys, vec!["West", "B"]);
        assert_eq!(cube.value(&cube.rows[0], "orders"), Some(1.0));
    }

    #[test]
    fn missing_field_surfaces_on_execute() {
        let t = table();
        let rows = t.all_rows();
        let err = t
            .query(&rows)
            .group_by(Field::State)
            .aggregate(Field::Sales, AggregateOp::Sum)
            .execute()
            .unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(c) if c == "state"));
    }

    #[test]
    fn aggregate_rows_of_nothing() {
        let col = Column::Float64(vec![None]);
        assert_eq!(aggregate_rows(&col, AggregateOp::Sum, &[0]), 0.0);
        assert_eq!(aggregate_rows(&col, AggregateOp::Count, &[0]), 0.0);
        assert!(aggregate_rows(&col, AggregateOp::Mean, &[0]).is_nan());
        assert!(aggregate_rows(&col, AggregateOp::Max, &[]).is_nan());
    }

    #[test]
    fn grouping_no_rows_yields_no_groups() {
        let t = table();
        let none = RowSet::default();
        let category = t.column(Field::Category).unwrap();

        assert!(sum_by_group(category, t.column(Field::Sales).unwrap(), &none).is_empty());
        let orders = t.column(Field::OrderKey).unwrap();
        assert!(distinct_count_by_group(category, orders, &none).is_empty());
        assert!(first_by_group(category, t.column(Field::Region).unwrap(), &none).is_empty());
        assert!(top_n(Vec::new(), 15).is_empty());
        assert!(bottom_n(Vec::new(), 10).is_empty());

        let cube = t
            .query(&none)
            .group_by(Field::Category)
            .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
            .order_by_desc("sales")
            .limit(5)
            .execute()
            .unwrap();
        assert_eq!(cube.dimensions, vec!["category"]);
        assert_eq!(cube.measures, vec!["sales"]);
        assert!(cube.rows.is_empty());
    }
}
