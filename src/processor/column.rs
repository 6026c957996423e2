use std::borrow::Cow;

use chrono::NaiveDateTime;

use crate::processor::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
    DateTime,
}

impl ColumnType {
    /// Infers the narrowest type that every non-empty value parses as.
    ///
    /// Int64 widens to Float64, anything unparseable widens to Str. A column
    /// with no non-empty values is typed as Str.
    pub fn infer<'a, I>(values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut inferred: Option<ColumnType> = None;
        for field in values {
            if field.is_empty() {
                continue;
            }
            inferred = Some(match inferred {
                None | Some(ColumnType::Int64) => {
                    if atoi_simd::parse::<i64>(field).is_ok() {
                        ColumnType::Int64
                    } else if fast_float::parse::<f64, _>(field).is_ok() {
                        ColumnType::Float64
                    } else {
                        return ColumnType::Str;
                    }
                }
                Some(ColumnType::Float64) => {
                    if fast_float::parse::<f64, _>(field).is_ok() {
                        ColumnType::Float64
                    } else {
                        return ColumnType::Str;
                    }
                }
                Some(other) => other,
            });
        }
        inferred.unwrap_or(ColumnType::Str)
    }
}

/// A nullable, fully materialized column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Str(Vec<Option<String>>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl Column {
    pub fn new_null(column_type: ColumnType, len: usize) -> Self {
        match column_type {
            ColumnType::Int64 => Column::Int64(vec![None; len]),
            ColumnType::Float64 => Column::Float64(vec![None; len]),
            ColumnType::Str => Column::Str(vec![None; len]),
            ColumnType::DateTime => Column::DateTime(vec![None; len]),
        }
    }

    /// Parses raw field bytes into a column of the given type.
    ///
    /// `None` and empty fields become nulls. Fields that fail to parse also
    /// become nulls and are reported as `(row, value)` pairs.
    pub fn parse<'a, I>(column_type: ColumnType, values: I) -> (Column, Vec<(usize, String)>)
    where
        I: IntoIterator<Item = Option<&'a [u8]>>,
    {
        let mut rejected = Vec::new();
        let values = values
            .into_iter()
            .map(|v| v.filter(|bytes| !bytes.is_empty()));

        let column = match column_type {
            ColumnType::Int64 => Column::Int64(
                values
                    .enumerate()
                    .map(|(row, field)| {
                        field.and_then(|bytes| match atoi_simd::parse::<i64>(bytes) {
                            Ok(v) => Some(v),
                            Err(_) => {
                                rejected.push((row, String::from_utf8_lossy(bytes).into_owned()));
                                None
                            }
                        })
                    })
                    .collect(),
            ),
            ColumnType::Float64 => Column::Float64(
                values
                    .enumerate()
                    .map(|(row, field)| {
                        field.and_then(|bytes| match fast_float::parse::<f64, _>(bytes) {
                            Ok(v) => Some(v),
                            Err(_) => {
                                rejected.push((row, String::from_utf8_lossy(bytes).into_owned()));
                                None
                            }
                        })
                    })
                    .collect(),
            ),
            ColumnType::Str => Column::Str(
                values
                    .map(|field| field.map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
                    .collect(),
            ),
            ColumnType::DateTime => Column::DateTime(
                values
                    .enumerate()
                    .map(|(row, field)| {
                        field.and_then(|bytes| {
                            let text = String::from_utf8_lossy(bytes);
                            match parse_datetime(&text) {
                                Some(v) => Some(v),
                                None => {
                                    rejected.push((row, text.into_owned()));
                                    None
                                }
                            }
                        })
                    })
                    .collect(),
            ),
        };

        (column, rejected)
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Str(_) => ColumnType::Str,
            Column::DateTime(_) => ColumnType::DateTime,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int64(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Column::Int64(v) => v.get(idx).is_none_or(Option::is_none),
            Column::Float64(v) => v.get(idx).is_none_or(Option::is_none),
            Column::Str(v) => v.get(idx).is_none_or(Option::is_none),
            Column::DateTime(v) => v.get(idx).is_none_or(Option::is_none),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// Numeric view of a cell; integers widen to f64, non-numeric columns yield `None`.
    pub fn f64_at(&self, idx: usize) -> Option<f64> {
        match self {
            Column::Int64(v) => v.get(idx).copied().flatten().map(|x| x as f64),
            Column::Float64(v) => v.get(idx).copied().flatten(),
            Column::Str(_) | Column::DateTime(_) => None,
        }
    }

    pub fn i64_at(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64(v) => v.get(idx).copied().flatten(),
            Column::Float64(v) => v
                .get(idx)
                .copied()
                .flatten()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64),
            Column::Str(v) => v.get(idx).and_then(|s| s.as_deref()?.trim().parse().ok()),
            Column::DateTime(_) => None,
        }
    }

    pub fn datetime_at(&self, idx: usize) -> Option<NaiveDateTime> {
        match self {
            Column::DateTime(v) => v.get(idx).copied().flatten(),
            Column::Str(v) => v.get(idx).and_then(|s| parse_datetime(s.as_deref()?)),
            _ => None,
        }
    }

    /// Textual view of a cell, borrowed for string columns.
    pub fn text_at(&self, idx: usize) -> Option<Cow<'_, str>> {
        match self {
            Column::Str(v) => v.get(idx).and_then(|s| s.as_deref()).map(Cow::Borrowed),
            Column::Int64(v) => v.get(idx).copied().flatten().map(|x| Cow::Owned(x.to_string())),
            Column::Float64(v) => v.get(idx).copied().flatten().map(|x| Cow::Owned(x.to_string())),
            Column::DateTime(v) => v
                .get(idx)
                .copied()
                .flatten()
                .map(|d| Cow::Owned(d.format("%Y-%m-%d %H:%M:%S").to_string())),
        }
    }

    pub fn value_at(&self, idx: usize) -> Option<Value> {
        match self {
            Column::Int64(v) => v.get(idx).copied().flatten().map(Value::Int),
            Column::Float64(v) => v.get(idx).copied().flatten().map(Value::Float),
            Column::Str(v) => v.get(idx).cloned().flatten().map(Value::Str),
            Column::DateTime(v) => v
                .get(idx)
                .copied()
                .flatten()
                .map(|d| Value::Int(d.and_utc().timestamp_millis())),
        }
    }

    /// Gathers rows by index; `None` produces a null cell.
    pub fn take(&self, indices: &[Option<usize>]) -> Column {
        fn gather<T: Clone>(values: &[Option<T>], indices: &[Option<usize>]) -> Vec<Option<T>> {
            indices
                .iter()
                .map(|idx| idx.and_then(|i| values.get(i).cloned().flatten()))
                .collect()
        }

        match self {
            Column::Int64(v) => Column::Int64(gather(v, indices)),
            Column::Float64(v) => Column::Float64(gather(v, indices)),
            Column::Str(v) => Column::Str(gather(v, indices)),
            Column::DateTime(v) => Column::DateTime(gather(v, indices)),
        }
    }

    /// Re-types a string column as date-time. Fails with the first value that does
    /// not parse; non-string columns are returned unchanged.
    pub fn to_datetime(&self) -> Result<Column, String> {
        match self {
            Column::Str(values) => values
                .iter()
                .map(|cell| match cell.as_deref() {
                    None => Ok(None),
                    Some(s) if s.trim().is_empty() => Ok(None),
                    Some(s) => parse_datetime(s).map(Some).ok_or_else(|| s.to_string()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::DateTime),
            other => Ok(other.clone()),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Parses the date and date-time layouts warehouses commonly emit.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|fmt| {
                chrono::NaiveDate::parse_from_str(text, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}
