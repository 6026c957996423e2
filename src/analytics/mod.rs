//! Pure aggregation functions over the analysis table.
//!
//! Every function takes the columns it reads plus a [`RowSet`] and returns
//! owned results; nothing here mutates state or logs.

use serde::Serialize;

pub mod aggregate;
pub mod bucket;
pub mod customer;
pub mod insights;
pub mod stats;

pub use aggregate::{GroupQuery, GroupRow, MultiDimensionalResult};
pub use bucket::{DiscountBucket, HistogramBin};
pub use customer::CustomerType;

/// Indices of the analysis-table rows a view aggregates over, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSet(Vec<usize>);

impl RowSet {
    pub fn all(row_count: usize) -> Self {
        RowSet((0..row_count).collect())
    }

    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        RowSet(indices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Keeps the rows for which `keep` holds.
    pub fn retain(&self, mut keep: impl FnMut(usize) -> bool) -> RowSet {
        RowSet(self.0.iter().copied().filter(|&i| keep(i)).collect())
    }
}

/// One labelled value of a grouped aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub value: f64,
}

impl GroupTotal {
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        GroupTotal {
            key: key.into(),
            value,
        }
    }
}
