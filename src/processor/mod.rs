use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use thiserror::Error;

pub mod column;
pub mod csv_reader;
pub mod csv_writer;
pub mod table;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Schema/parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Schema mapping error: {0}")]
    Schema(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Default)]
pub struct ParseSummary {
    pub rows_processed: usize,
    pub errors: Vec<ParseError>,
}

#[derive(Debug)]
pub struct ParseError {
    /// 0-based index among the data rows kept in the table. A malformed
    /// line that was skipped reports the index the next kept row takes.
    pub row: usize,
    pub column: String,
    pub value: String,
    pub error: Option<String>,
}

/// A single cell value. Used for join keys and group keys.
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer cell
    Int(i64),
    /// Float cell
    Float(f64),
    /// String cell
    Str(String),
}

impl Value {
    /// Normalizes integral floats to integers so `5` and `5.0` join.
    pub fn into_key(self) -> Value {
        match self {
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::Int(f as i64)
            }
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// Aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    /// Sum of all numeric values
    Sum,
    /// Count of non-null values
    Count,
    /// Number of distinct non-null values
    DistinctCount,
    /// Mean of numeric values
    Mean,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}
