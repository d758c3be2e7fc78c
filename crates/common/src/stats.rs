//! Percentile statistics over benchmark measurements.

use serde::{Deserialize, Serialize};

/// p50/p95/p99 summary for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStatistics {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyStatistics {
    pub const ZERO: LatencyStatistics = LatencyStatistics {
        p50: 0.0,
        p95: 0.0,
        p99: 0.0,
    };
}

/// Linear-interpolation percentile over a sorted slice.
///
/// For sorted `a` of length `n`: `position = (n-1) · p/100`,
/// `result = a[⌊pos⌋] + fraction · (a[⌈pos⌉] − a[⌊pos⌋])`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = (n - 1) as f64 * (p / 100.0);
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let fraction = position - lower as f64;
                sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
            }
        }
    }
}

/// Compute p50/p95/p99 over a value set. Empty input returns zeros.
pub fn calculate_statistics(values: &[f64]) -> LatencyStatistics {
    if values.is_empty() {
        return LatencyStatistics::ZERO;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    LatencyStatistics {
        p50: percentile(&sorted, 50.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input_returns_zeros() {
        assert_eq!(calculate_statistics(&[]), LatencyStatistics::ZERO);
    }

    #[test]
    fn test_single_value() {
        let stats = calculate_statistics(&[42.0]);
        assert_eq!(stats.p50, 42.0);
        assert_eq!(stats.p95, 42.0);
        assert_eq!(stats.p99, 42.0);
    }

    #[test]
    fn test_three_value_interpolation() {
        // 100/150/200: pos(p50)=1.0, pos(p95)=1.9, pos(p99)=1.98
        let stats = calculate_statistics(&[100.0, 150.0, 200.0]);
        assert_eq!(stats.p50, 150.0);
        assert!((stats.p95 - 190.0).abs() < 1e-9);
        assert!((stats.p99 - 198.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input() {
        let stats = calculate_statistics(&[200.0, 100.0, 150.0]);
        assert_eq!(stats.p50, 150.0);
    }

    proptest! {
        #[test]
        fn prop_percentiles_are_ordered_and_bounded(
            values in proptest::collection::vec(0.0f64..1e6, 1..200)
        ) {
            let stats = calculate_statistics(&values);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(stats.p50 <= stats.p95);
            prop_assert!(stats.p95 <= stats.p99);
            prop_assert!(stats.p50 >= min && stats.p50 <= max);
            prop_assert!(stats.p99 >= min && stats.p99 <= max);
        }
    }
}
