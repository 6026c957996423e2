#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    _mm256_add_pd, _mm256_loadu_pd, _mm256_max_pd, _mm256_min_pd, _mm256_set1_pd,
    _mm256_setzero_pd, _mm256_storeu_pd,
};

/// Sum of an f64 slice using AVX2 when available, scalar otherwise.
pub fn sum_f64(values: &[f64]) -> f64 {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { sum_f64_avx2(values) };
        }
    }
    values.iter().sum()
}

/// Minimum and maximum of an f64 slice. NaNs must be filtered out by the caller.
pub fn min_max_f64(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return Some(unsafe { min_max_f64_avx2(values) });
        }
    }
    Some(min_max_scalar(values))
}

fn min_max_scalar(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn sum_f64_avx2(values: &[f64]) -> f64 {
    const LANES: usize = 4; // __m256d holds 4 f64s
    let mut sum = _mm256_setzero_pd();

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        sum = _mm256_add_pd(sum, v);
    }

    let mut sum_arr = [0f64; LANES];
    unsafe { _mm256_storeu_pd(sum_arr.as_mut_ptr(), sum) };

    sum_arr.iter().sum::<f64>() + remainder.iter().sum::<f64>()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn min_max_f64_avx2(values: &[f64]) -> (f64, f64) {
    const LANES: usize = 4;
    let mut min = _mm256_set1_pd(f64::INFINITY);
    let mut max = _mm256_set1_pd(f64::NEG_INFINITY);

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let v = unsafe { _mm256_loadu_pd(chunk.as_ptr()) };
        min = _mm256_min_pd(min, v);
        max = _mm256_max_pd(max, v);
    }

    // horizontal reduction
    let mut min_arr = [f64::INFINITY; LANES];
    let mut max_arr = [f64::NEG_INFINITY; LANES];
    unsafe { _mm256_storeu_pd(min_arr.as_mut_ptr(), min) };
    unsafe { _mm256_storeu_pd(max_arr.as_mut_ptr(), max) };

    let (rlo, rhi) = min_max_scalar(remainder);
    let lo = min_max_scalar(&min_arr).0.min(rlo);
    let hi = min_max_scalar(&max_arr).1.max(rhi);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_matches_scalar_for_odd_lengths() {
        let values: Vec<f64> = (1..=11).map(|v| v as f64 * 0.5).collect();
        assert!((sum_f64(&values) - 33.0).abs() < 1e-9);
        assert_eq!(sum_f64(&[]), 0.0);
    }

    #[test]
    fn min_max_handles_remainders() {
        let values = [3.0, -1.0, 8.5, 2.0, 0.0, -4.25, 7.0];
        assert_eq!(min_max_f64(&values), Some((-4.25, 8.5)));
        assert_eq!(min_max_f64(&[2.0]), Some((2.0, 2.0)));
        assert_eq!(min_max_f64(&[]), None);
    }
}
