use crate::constants::{MAD_SCALE, SPREAD_EPSILON};

/// Median of a slice. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Median absolute deviation of `values` around `centre`.
pub fn median_abs_deviation(values: &[f64], centre: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - centre).abs()).collect();
    median(&deviations)
}

/// Outlier-robust dispersion of a difference distribution.
///
/// Differences deviating from their median by more than `outlier_boundary`
/// robust standard deviations (1.4826 x MAD) are excluded, then the mean of
/// the squared survivors is returned. A degenerate spread skips trimming so
/// constant signals score 0 rather than losing every sample.
pub fn robust_mean_square(diffs: &[f64], outlier_boundary: f64) -> f64 {
    if diffs.is_empty() {
        return 0.0;
    }
    let centre = median(diffs);
    let spread = MAD_SCALE * median_abs_deviation(diffs, centre);
    if spread < SPREAD_EPSILON {
        return diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64;
    }

    let limit = outlier_boundary * spread;
    let mut sum = 0.0;
    let mut count = 0usize;
    for &d in diffs {
        if (d - centre).abs() <= limit {
            sum += d * d;
            count += 1;
        }
    }
    // The median element always survives trimming.
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn test_median_even() {
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_median_empty() {
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_median_abs_deviation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(median_abs_deviation(&values, 3.0), 1.0);
    }

    #[test]
    fn test_robust_mean_square_excludes_outliers() {
        // Tight cluster around zero plus one large transient.
        let mut diffs = vec![0.1, -0.1, 0.05, -0.05, 0.12, -0.08, 0.02, -0.11];
        let with_outlier = {
            diffs.push(100.0);
            diffs
        };
        let score = robust_mean_square(&with_outlier, 3.0);
        assert!(
            score < 1.0,
            "outlier should not dominate the score, got {score}"
        );
    }

    #[test]
    fn test_robust_mean_square_constant_signal() {
        let diffs = vec![0.0; 16];
        assert_eq!(robust_mean_square(&diffs, 3.0), 0.0);
    }

    #[test]
    fn test_robust_mean_square_degenerate_spread_keeps_all() {
        // All differences identical: MAD is 0, trimming must not drop them.
        let diffs = vec![2.0; 8];
        assert_relative_eq!(robust_mean_square(&diffs, 3.0), 4.0);
    }
}
