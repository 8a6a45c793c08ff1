//! Scoring utilities for linking objects across consecutive frames.

use std::ops::Add;

/// Quality of a candidate assignment, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Score {
    /// Number of linkage errors
    pub errors: usize,
    /// Deviation of the observed growth from the expected growth
    pub distance: f64,
}

impl Score {
    pub fn new(errors: usize, distance: f64) -> Self {
        Self { errors, distance }
    }

    /// Fewer errors always wins; on equal errors the distance must improve
    /// by more than `margin`.
    pub fn better_than(&self, other: &Score, margin: f64) -> bool {
        if self.errors != other.errors {
            return self.errors < other.errors;
        }
        self.distance + margin < other.distance
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score {
            errors: self.errors + rhs.errors,
            distance: self.distance + rhs.distance,
        }
    }
}

/// Median of finite values, `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Distance from `value` to the closed interval `[min, max]`.
#[inline]
pub fn interval_distance(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min - value
    } else if value > max {
        value - max
    } else {
        0.0
    }
}

/// Size-weighted mean of the known expectations.
pub fn weighted_expectation(items: impl IntoIterator<Item = (f64, Option<f64>)>) -> Option<f64> {
    let (sum, weight) = items
        .into_iter()
        .filter_map(|(size, expected)| expected.map(|e| (size, e)))
        .fold((0.0, 0.0), |(s, w), (size, e)| (s + size * e, w + size));
    if weight > 0.0 { Some(sum / weight) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_ordering() {
        let a = Score::new(0, 0.5);
        let b = Score::new(1, 0.0);
        assert!(a.better_than(&b, 0.1));
        assert!(!b.better_than(&a, 0.1));

        // equal errors: the improvement must exceed the margin
        let c = Score::new(0, 0.45);
        assert!(!c.better_than(&a, 0.1));
        let d = Score::new(0, 0.3);
        assert!(d.better_than(&a, 0.1));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 1.0]), Some(1.0));
    }

    #[test]
    fn test_interval_distance() {
        assert_eq!(interval_distance(1.0, 0.8, 1.5), 0.0);
        assert!((interval_distance(0.5, 0.8, 1.5) - 0.3).abs() < 1e-12);
        assert!((interval_distance(2.0, 0.8, 1.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_expectation() {
        assert_eq!(weighted_expectation([(10.0, None)]), None);
        let e = weighted_expectation([(10.0, Some(1.0)), (30.0, Some(1.2)), (5.0, None)]).unwrap();
        assert!((e - 1.15).abs() < 1e-12);
    }
}
