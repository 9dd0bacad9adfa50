//! Descriptive statistics and normal quantiles.
//!
//! Note: `median` reorders the input slice.

use std::f64::consts::SQRT_2;

use statrs::function::erf::erf_inv;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        let a = values[n / 2 - 1];
        let b = values[n / 2];
        (a + b) / 2.0
    }
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
pub fn sample_sd(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Critical value `z` with P(|Z| <= z) = `level` for a standard normal.
pub fn two_sided_z(level: f64) -> f64 {
    SQRT_2 * erf_inv(level)
}
