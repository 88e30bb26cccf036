//! Normalization primitives shared by the cost functions

/// Dispersion of a sample: `min(1, std_dev / (2 * mean))`
///
/// Uses the sample (n - 1) standard deviation. Returns 0 for an empty or
/// single-value sample and for a zero mean.
pub fn cost_from_stats(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    dispersion(mean, variance.sqrt())
}

/// `min(1, std_dev / (2 * mean))`, 0 when the ratio is undefined
pub fn dispersion(mean: f64, std_dev: f64) -> f64 {
    if mean <= 0.0 || !mean.is_finite() || !std_dev.is_finite() {
        return 0.0;
    }
    (std_dev / (2.0 * mean)).clamp(0.0, 1.0)
}

/// Dispersion computed from integer moments of `n` values
///
/// `sum` and `sum_sq` are the exact sum and sum of squares, so incremental
/// callers never accumulate rounding error.
pub fn dispersion_from_moments(n: u64, sum: u128, sum_sq: u128) -> f64 {
    if n < 2 || sum == 0 {
        return 0.0;
    }
    let n = n as u128;
    // n * sum_sq >= sum^2 for any real sample
    let spread = (n * sum_sq).saturating_sub(sum * sum);
    let variance = spread as f64 / (n * (n - 1)) as f64;
    let mean = sum as f64 / n as f64;

    dispersion(mean, variance.sqrt())
}

/// `|n * count - total|`, the absolute deviation of one server's count from
/// the mean, scaled by `n` to stay integral
pub fn scaled_deviation(n: usize, count: usize, total: usize) -> u64 {
    (n as u64 * count as u64).abs_diff(total as u64)
}

/// Normalized skew of `n` counts summing to `total`
///
/// `deviation_sum` is the sum of [`scaled_deviation`] over all counts. The
/// result is the total absolute deviation from the mean divided by its
/// largest possible value, reached when one server holds everything.
pub fn skew_from_deviation(deviation_sum: u64, n: usize, total: usize) -> f64 {
    if n < 2 || total == 0 {
        return 0.0;
    }
    let worst = 2.0 * total as f64 * (n - 1) as f64;
    (deviation_sum as f64 / worst).clamp(0.0, 1.0)
}

/// Normalized skew of a count vector
pub fn skew_cost(counts: &[usize]) -> f64 {
    let n = counts.len();
    let total: usize = counts.iter().sum();
    let deviation_sum = counts
        .iter()
        .map(|&c| scaled_deviation(n, c, total))
        .sum();
    skew_from_deviation(deviation_sum, n, total)
}
