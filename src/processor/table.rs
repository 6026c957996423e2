use arrow2::{
    array::{Array, Float64Array, Int64Array, Utf8Array},
    chunk::Chunk,
    datatypes::{DataType, Field, Schema, TimeUnit},
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::sync::Arc;

use crate::processor::{
    DashboardError, ParseError, ParseSummary,
    column::{Column, ColumnType},
};

/// A named, column-oriented table with nullable typed columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty(name: &str) -> Self {
        Table {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builds a table from named columns.
    ///
    /// # Errors
    /// Returns [`DashboardError::Parse`] if column lengths differ or a header repeats.
    pub fn from_columns(
        name: &str,
        columns: Vec<(String, Column)>,
    ) -> Result<Self, DashboardError> {
        let row_count = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut headers = Vec::with_capacity(columns.len());
        let mut cols = Vec::with_capacity(columns.len());

        for (header, column) in columns {
            if column.len() != row_count {
                return Err(DashboardError::Parse(format!(
                    "{name}: column '{header}' has {} rows, expected {row_count}",
                    column.len()
                )));
            }
            if headers.contains(&header) {
                return Err(DashboardError::Parse(format!(
                    "{name}: duplicate column '{header}'"
                )));
            }
            headers.push(header);
            cols.push(column);
        }

        Ok(Table {
            name: name.to_string(),
            headers,
            columns: cols,
            row_count,
        })
    }

    /// Builds a table from textual rows, inferring each column's type the same way
    /// the CSV reader does. `None` cells are SQL nulls.
    pub fn from_text_rows(
        name: &str,
        headers: Vec<String>,
        rows: &[Vec<Option<String>>],
    ) -> Result<(Self, ParseSummary), DashboardError> {
        let width = headers.len();
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(DashboardError::Parse(format!(
                "{name}: row {row} has {} fields, expected {width}",
                bad.len()
            )));
        }

        let parsed: Vec<(Column, Vec<(usize, String)>)> = (0..width)
            .map(|col_idx| {
                let cells = || rows.iter().map(move |r| r[col_idx].as_deref().map(str::as_bytes));
                let column_type = ColumnType::infer(cells().flatten());
                Column::parse(column_type, cells())
            })
            .collect();

        let mut summary = ParseSummary {
            rows_processed: rows.len(),
            errors: Vec::new(),
        };
        let mut columns = Vec::with_capacity(width);
        for (header, (column, rejected)) in headers.into_iter().zip(parsed) {
            summary
                .errors
                .extend(rejected.into_iter().map(|(row, value)| ParseError {
                    row,
                    column: header.clone(),
                    value,
                    error: None,
                }));
            columns.push((header, column));
        }

        let mut table = Table::from_columns(name, columns)?;
        table.row_count = rows.len();
        Ok((table, summary))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.headers.iter().map(String::as_str).zip(self.columns.iter())
    }

    pub fn has_column(&self, col_name: &str) -> bool {
        self.headers.iter().any(|h| h == col_name)
    }

    pub fn get_col(&self, col_name: &str) -> Result<&Column, DashboardError> {
        let col_pos = self
            .headers
            .iter()
            .position(|cn| cn == col_name)
            .ok_or_else(|| DashboardError::MissingColumn(col_name.to_string()))?;

        self.columns
            .get(col_pos)
            .ok_or_else(|| DashboardError::MissingColumn(col_name.to_string()))
    }

    /// Appends a column; the table must be empty of columns or match its length.
    pub fn push_column(&mut self, header: String, column: Column) -> Result<(), DashboardError> {
        if self.headers.is_empty() && self.columns.is_empty() {
            self.row_count = column.len();
        } else if column.len() != self.row_count {
            return Err(DashboardError::Parse(format!(
                "{}: column '{header}' has {} rows, expected {}",
                self.name,
                column.len(),
                self.row_count
            )));
        }
        if self.has_column(&header) {
            return Err(DashboardError::Parse(format!(
                "{}: duplicate column '{header}'",
                self.name
            )));
        }
        self.headers.push(header);
        self.columns.push(column);
        Ok(())
    }

    /// Replaces an existing column with one of the same length.
    pub fn replace_column(&mut self, col_name: &str, column: Column) -> Result<(), DashboardError> {
        let pos = self
            .headers
            .iter()
            .position(|h| h == col_name)
            .ok_or_else(|| DashboardError::MissingColumn(col_name.to_string()))?;
        if column.len() != self.row_count {
            return Err(DashboardError::Parse(format!(
                "{}: replacement for '{col_name}' has wrong length",
                self.name
            )));
        }
        self.columns[pos] = column;
        Ok(())
    }

    pub fn rename(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Converts the table into an Arrow schema and chunk for export.
    pub fn to_arrow(&self) -> (Schema, Chunk<Arc<dyn Array>>) {
        let timestamp = DataType::Timestamp(TimeUnit::Millisecond, None);

        let fields: Vec<Field> = self
            .headers
            .iter()
            .zip(&self.columns)
            .map(|(h, col)| {
                let dtype = match col {
                    Column::Int64(_) => DataType::Int64,
                    Column::Float64(_) => DataType::Float64,
                    Column::Str(_) => DataType::Utf8,
                    Column::DateTime(_) => timestamp.clone(),
                };
                Field::new(h, dtype, true)
            })
            .collect();

        let schema = Schema::from(fields);

        let arrays: Vec<Arc<dyn Array>> = self
            .columns
            .par_iter()
            .map(|col| match col {
                Column::Int64(values) => {
                    Arc::new(Int64Array::from(values.as_slice())) as Arc<dyn Array>
                }
                Column::Float64(values) => {
                    Arc::new(Float64Array::from(values.as_slice())) as Arc<dyn Array>
                }
                Column::Str(values) => {
                    Arc::new(Utf8Array::<i32>::from(values.as_slice())) as Arc<dyn Array>
                }
                Column::DateTime(values) => {
                    let millis: Vec<Option<i64>> = values
                        .iter()
                        .map(|v| v.map(|d| d.and_utc().timestamp_millis()))
                        .collect();
                    Arc::new(Int64Array::from(millis.as_slice()).to(timestamp.clone()))
                        as Arc<dyn Array>
                }
            })
            .collect();

        (schema, Chunk::new(arrays))
    }
}
