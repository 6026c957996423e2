use std::collections::HashMap;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, warn};

use crate::pipeline::AnalysisTable;
use crate::processor::{DashboardError, Value, column::Column, table::Table};
use crate::warehouse::{Field, SchemaMapping, StarSchema};

/// Left-joins `right` onto `left` through the shared column `key`.
///
/// Output has exactly one row per left row, in left order. Left rows without a
/// match get nulls for every right column. When the right key repeats, the
/// first occurrence wins. Right columns whose name is already taken on the
/// left are suffixed with `_<right table name>`.
///
/// # Errors
/// [`DashboardError::MissingColumn`] if `left` lacks `key`, or if `right` has
/// rows but lacks `key`.
pub fn left_join(left: &Table, right: &Table, key: &str) -> Result<Table, DashboardError> {
    let left_keys = left.get_col(key)?;

    let indices: Vec<Option<usize>> = if right.has_column(key) {
        let right_keys = right.get_col(key)?;
        let lookup = build_lookup(right_keys, right.name());
        (0..left.row_count())
            .into_par_iter()
            .map(|i| {
                left_keys
                    .value_at(i)
                    .and_then(|v| lookup.get(&v.into_key()).copied())
            })
            .collect()
    } else if right.is_empty() {
        vec![None; left.row_count()]
    } else {
        return Err(DashboardError::MissingColumn(format!(
            "{}.{key}",
            right.name()
        )));
    };

    let gathered: Vec<(String, Column)> = right
        .columns()
        .filter(|(name, _)| *name != key)
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(name, column)| {
            let out_name = if left.has_column(name) {
                format!("{name}_{}", right.name())
            } else {
                name.to_string()
            };
            (out_name, column.take(&indices))
        })
        .collect();

    let mut joined = left.clone();
    for (name, column) in gathered {
        joined.push_column(name, column)?;
    }

    let matched = indices.iter().filter(|i| i.is_some()).count();
    debug!(
        right = right.name(),
        key,
        rows = left.row_count(),
        matched,
        "left join"
    );
    Ok(joined)
}

fn build_lookup(keys: &Column, table_name: &str) -> HashMap<Value, usize> {
    let mut lookup = HashMap::with_capacity(keys.len());
    let mut duplicates = 0usize;
    for row in 0..keys.len() {
        let Some(key) = keys.value_at(row) else {
            continue;
        };
        if lookup.contains_key(&key.clone().into_key()) {
            duplicates += 1;
            continue;
        }
        lookup.insert(key.into_key(), row);
    }
    if duplicates > 0 {
        warn!(
            table = table_name,
            duplicates, "dimension has repeated surrogate keys, keeping first occurrence"
        );
    }
    lookup
}

/// Parses the order-date column into date-times in place.
///
/// Leaves the column untouched and logs a warning when any value fails to
/// parse. Already-converted columns are left as they are.
pub fn coerce_order_date(table: &mut Table, column: &str) {
    let Ok(current) = table.get_col(column) else {
        return;
    };
    match current.to_datetime() {
        Ok(converted) => {
            if converted != *current {
                if let Err(e) = table.replace_column(column, converted) {
                    warn!(column, error = %e, "order date conversion failed");
                }
            }
        }
        Err(value) => {
            warn!(column, value = %value, "order date not parseable, keeping text");
        }
    }
}

/// Joins the fact table with the five dimensions into the analysis table.
///
/// # Errors
/// Propagates key-column errors from [`left_join`].
pub fn join_star(
    star: &StarSchema,
    schema: &SchemaMapping,
) -> Result<AnalysisTable, DashboardError> {
    let fact = &star.fact_sales;
    if fact.headers().is_empty() {
        return Ok(AnalysisTable::empty(schema.clone()));
    }

    let mut joined = fact.clone().rename("analysis");
    for (key, dim) in Field::KEYS {
        joined = left_join(&joined, star.table(dim), schema.column(key))?;
    }
    coerce_order_date(&mut joined, schema.column(Field::OrderDate));

    debug_assert_eq!(joined.row_count(), fact.row_count());
    Ok(AnalysisTable::new(joined, schema.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::column::ColumnType;

    fn fact(keys: Vec<Option<i64>>) -> Table {
        let sales = keys.iter().map(|_| Some(1.0)).collect();
        Table::from_columns(
            "fact",
            vec![
                ("k".into(), Column::Int64(keys)),
                ("sales".into(), Column::Float64(sales)),
            ],
        )
        .unwrap()
    }

    fn dim() -> Table {
        Table::from_columns(
            "dim",
            vec![
                ("k".into(), Column::Float64(vec![Some(1.0), Some(2.0), Some(1.0)])),
                (
                    "name".into(),
                    Column::Str(vec![Some("one".into()), Some("two".into()), Some("uno".into())]),
                ),
                ("sales".into(), Column::Float64(vec![Some(9.0), Some(9.0), Some(9.0)])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn left_join_preserves_cardinality_and_order() {
        let left = fact(vec![Some(2), Some(7), None, Some(1), Some(2)]);
        let joined = left_join(&left, &dim(), "k").unwrap();

        assert_eq!(joined.row_count(), 5);
        let names = joined.get_col("name").unwrap();
        assert_eq!(names.text_at(0).unwrap(), "two");
        assert!(names.is_null(1));
        assert!(names.is_null(2));
        // first occurrence of a repeated key wins
        assert_eq!(names.text_at(3).unwrap(), "one");
        assert_eq!(names.text_at(4).unwrap(), "two");
    }

    #[test]
    fn colliding_names_get_table_suffix() {
        let joined = left_join(&fact(vec![Some(1)]), &dim(), "k").unwrap();
        assert!(joined.has_column("sales"));
        assert!(joined.has_column("sales_dim"));
        assert_eq!(joined.get_col("sales").unwrap().f64_at(0), Some(1.0));
    }

    #[test]
    fn empty_dimension_yields_null_attributes() {
        let right = Table::from_columns(
            "dim",
            vec![
                ("k".into(), Column::Int64(vec![])),
                ("label".into(), Column::Str(vec![])),
            ],
        )
        .unwrap();
        let joined = left_join(&fact(vec![Some(1), Some(2)]), &right, "k").unwrap();
        assert_eq!(joined.get_col("label").unwrap().null_count(), 2);

        let blank = Table::empty("dim");
        let joined = left_join(&fact(vec![Some(1)]), &blank, "k").unwrap();
        assert_eq!(joined.headers().len(), 2);
    }

    #[test]
    fn order_date_coercion_is_idempotent_and_non_fatal() {
        let mut table = Table::from_columns(
            "t",
            vec![(
                "order_date".into(),
                Column::Str(vec![Some("2017-03-01".into()), None]),
            )],
        )
        .unwrap();
        coerce_order_date(&mut table, "order_date");
        let once = table.clone();
        coerce_order_date(&mut table, "order_date");
        assert_eq!(table, once);
        assert_eq!(
            table.get_col("order_date").unwrap().column_type(),
            ColumnType::DateTime
        );

        let mut bad = Table::from_columns(
            "t",
            vec![("order_date".into(), Column::Str(vec![Some("someday".into())]))],
        )
        .unwrap();
        coerce_order_date(&mut bad, "order_date");
        assert_eq!(bad.get_col("order_date").unwrap().column_type(), ColumnType::Str);
    }

    #[test]
    fn join_star_of_blank_fact_is_empty() {
        let analysis = join_star(&StarSchema::empty(), &SchemaMapping::default()).unwrap();
        assert!(analysis.is_empty());
    }
}
