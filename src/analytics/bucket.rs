use std::fmt;

use serde::{Deserialize, Serialize};

use crate::helpers::simd_helpers::min_max_f64;

/// Discount ranges used by the profit page.
///
/// Lower bounds are inclusive, so a discount sitting exactly on a boundary
/// belongs to the upper bucket. The last bucket is closed at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountBucket {
    #[serde(rename = "0-10%")]
    UpTo10,
    #[serde(rename = "10-20%")]
    From10To20,
    #[serde(rename = "20-30%")]
    From20To30,
    #[serde(rename = "30%+")]
    Over30,
}

impl DiscountBucket {
    pub const ALL: [DiscountBucket; 4] = [
        DiscountBucket::UpTo10,
        DiscountBucket::From10To20,
        DiscountBucket::From20To30,
        DiscountBucket::Over30,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DiscountBucket::UpTo10 => "0-10%",
            DiscountBucket::From10To20 => "10-20%",
            DiscountBucket::From20To30 => "20-30%",
            DiscountBucket::Over30 => "30%+",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|b| b.label() == label)
    }

    /// `[lower, upper)` bounds; the last bucket's upper bound is inclusive.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            DiscountBucket::UpTo10 => (0.0, 0.1),
            DiscountBucket::From10To20 => (0.1, 0.2),
            DiscountBucket::From20To30 => (0.2, 0.3),
            DiscountBucket::Over30 => (0.3, 1.0),
        }
    }

    /// Bucket of a discount fraction; `None` for NaN or values outside `[0, 1]`.
    pub fn of(discount: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&discount) {
            return None;
        }
        Some(if discount < 0.1 {
            DiscountBucket::UpTo10
        } else if discount < 0.2 {
            DiscountBucket::From10To20
        } else if discount < 0.3 {
            DiscountBucket::From20To30
        } else {
            DiscountBucket::Over30
        })
    }

    pub fn contains(self, discount: f64) -> bool {
        Self::of(discount) == Some(self)
    }
}

impl fmt::Display for DiscountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram from min to max with the last bin closed.
///
/// NaNs are ignored. A constant input yields one zero-width bin holding every
/// value; no input yields no bins.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let Some((lo, hi)) = min_max_f64(&finite) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if lo == hi {
        return vec![HistogramBin {
            start: lo,
            end: hi,
            count: finite.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + width * i as f64,
            end: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_go_to_upper_bucket() {
        assert_eq!(DiscountBucket::of(0.0), Some(DiscountBucket::UpTo10));
        assert_eq!(DiscountBucket::of(0.1), Some(DiscountBucket::From10To20));
        assert_eq!(DiscountBucket::of(0.2), Some(DiscountBucket::From20To30));
        assert_eq!(DiscountBucket::of(0.3), Some(DiscountBucket::Over30));
        assert_eq!(DiscountBucket::of(1.0), Some(DiscountBucket::Over30));
    }

    #[test]
    fn out_of_range_has_no_bucket() {
        assert_eq!(DiscountBucket::of(-0.01), None);
        assert_eq!(DiscountBucket::of(1.5), None);
        assert_eq!(DiscountBucket::of(f64::NAN), None);
    }

    #[test]
    fn every_valid_discount_lands_in_exactly_one_bucket() {
        for step in 0..=100 {
            let d = step as f64 / 100.0;
            let hits = DiscountBucket::ALL.iter().filter(|b| b.contains(d)).count();
            assert_eq!(hits, 1, "discount {d}");
        }
    }

    #[test]
    fn labels_round_trip_through_serde() {
        let json = serde_json::to_string(&DiscountBucket::Over30).unwrap();
        assert_eq!(json, "\"30%+\"");
        assert_eq!(DiscountBucket::from_label(" 10-20% "), Some(DiscountBucket::From10To20));
        assert_eq!(DiscountBucket::from_label("40%"), None);
    }

    #[test]
    fn histogram_closes_last_bin() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(bins[3].count, 2);
        assert_eq!(bins[3].end, 4.0);
    }

    #[test]
    fn histogram_degenerate_inputs() {
        assert!(histogram(&[], 20).is_empty());
        let one = histogram(&[0.2, 0.2, f64::NAN], 20);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].count, 2);
    }
}
