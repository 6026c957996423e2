use serde::Serialize;

use crate::analytics::RowSet;
use crate::processor::column::Column;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `profit / sales * 100` rounded to two decimals; NaN when sales is zero.
pub fn profit_margin(profit: f64, sales: f64) -> f64 {
    if sales == 0.0 {
        return f64::NAN;
    }
    round2(profit / sales * 100.0)
}

/// Pearson correlation of two equally long samples; NaN when undefined.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<String>,
    /// Row-major, `values[i][j]` correlates `fields[i]` with `fields[j]`
    pub values: Vec<Vec<f64>>,
}

/// Pairwise Pearson correlations using, for each pair, only the rows where
/// both values are present.
pub fn correlation_matrix(columns: &[(&str, &Column)], rows: &RowSet) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let (xs, ys): (Vec<f64>, Vec<f64>) = rows
                .iter()
                .filter_map(|r| Some((columns[i].1.f64_at(r)?, columns[j].1.f64_at(r)?)))
                .unzip();
            let r = pearson(&xs, &ys);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        fields: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

/// Centered rolling mean; positions without a full window are NaN.
pub fn rolling_mean_centered(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    let before = (window - 1) / 2;
    let after = window - 1 - before;
    (0..values.len())
        .map(|i| {
            if i < before || i + after >= values.len() {
                return f64::NAN;
            }
            let slice = &values[i - before..=i + after];
            slice.iter().sum::<f64>() / window as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_of_zero_sales_is_nan() {
        assert!(profit_margin(10.0, 0.0).is_nan());
        assert_eq!(profit_margin(1.0, 3.0), 33.33);
        assert_eq!(profit_margin(-50.0, 200.0), -25.0);
    }

    #[test]
    fn nan_margin_serializes_as_null() {
        let json = serde_json::to_string(&vec![profit_margin(1.0, 0.0)]).unwrap();
        assert_eq!(json, "[null]");
    }

    #[test]
    fn correlation_uses_pairwise_complete_rows() {
        let a = Column::Float64(vec![Some(1.0), Some(2.0), Some(3.0), None]);
        let b = Column::Float64(vec![Some(2.0), Some(4.0), Some(6.0), Some(100.0)]);
        let c = Column::Float64(vec![Some(5.0), Some(5.0), Some(5.0), Some(5.0)]);
        let m = correlation_matrix(&[("a", &a), ("b", &b), ("c", &c)], &RowSet::all(4));

        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
        assert_eq!(m.values[0][1], m.values[1][0]);
        // a constant column has no defined correlation
        assert!(m.values[0][2].is_nan());
        assert!(m.values[2][2].is_nan());
    }

    #[test]
    fn rolling_mean_is_centered() {
        let out = rolling_mean_centered(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 2.0);
        assert_eq!(out[2], 3.0);
        assert!(out[3].is_nan());
    }

    #[test]
    fn correlation_over_no_rows_keeps_its_shape() {
        let a = Column::Float64(vec![Some(1.0), Some(2.0)]);
        let b = Column::Float64(vec![Some(3.0), Some(5.0)]);
        let m = correlation_matrix(&[("a", &a), ("b", &b)], &RowSet::default());

        assert_eq!(m.fields, vec!["a", "b"]);
        assert_eq!(m.values.len(), 2);
        assert!(m.values.iter().flatten().all(|v| v.is_nan()));
        assert!(rolling_mean_centered(&[], 3).is_empty());
    }
}
