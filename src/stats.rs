//! Descriptive statistics over duration samples.
//!
//! Percentiles interpolate linearly between the two closest ranks and the
//! standard deviation is the sample (n-1) deviation, so a single sample has
//! an undefined (`NaN`) deviation.

use serde::Serialize;

use crate::trace::constants::PERCENTILES;

/// count / mean / std / min / p75 / p90 / p95 / p99 / max of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl Describe {
    /// Describe a set of samples. Returns `None` for an empty set.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let (mean, std) = mean_stdev(&sorted);
        let [p75, p90, p95, p99] = PERCENTILES.map(|p| percentile(&sorted, p));

        Some(Self {
            count: sorted.len() as u64,
            mean,
            std,
            min: sorted[0],
            p75,
            p90,
            p95,
            p99,
            max: sorted[sorted.len() - 1],
        })
    }

    /// Every value rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self {
            count: self.count,
            mean: round2(self.mean),
            std: round2(self.std),
            min: round2(self.min),
            p75: round2(self.p75),
            p90: round2(self.p90),
            p95: round2(self.p95),
            p99: round2(self.p99),
            max: round2(self.max),
        }
    }

    /// Column headers matching [`Describe::values`].
    pub fn headers() -> [&'static str; 9] {
        ["count", "mean", "std", "min", "75%", "90%", "95%", "99%", "max"]
    }

    /// Values in header order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.p75,
            self.p90,
            self.p95,
            self.p99,
            self.max,
        ]
    }
}

/// Mean and sample standard deviation. The deviation is `NaN` below two samples.
pub fn mean_stdev(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let m: f64 = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (m, f64::NAN);
    }
    let variance: f64 = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    (m, variance.sqrt())
}

/// Linearly interpolated percentile of an ascending slice, `p` in `[0, 1]`.
pub fn percentile(sorted_vals: &[f64], p: f64) -> f64 {
    if sorted_vals.is_empty() {
        return f64::NAN;
    }
    let rank = p.clamp(0.0, 1.0) * (sorted_vals.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted_vals[lo] + (sorted_vals[hi] - sorted_vals[lo]) * frac
}

/// Round to two decimals, half away from zero.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_empty() {
        assert!(Describe::from_samples(&[]).is_none());
    }

    #[test]
    fn test_describe_single_sample() {
        let d = Describe::from_samples(&[4.0]).unwrap();
        assert_eq!(d.count, 1);
        assert_eq!(d.mean, 4.0);
        assert!(d.std.is_nan());
        assert_eq!(d.min, 4.0);
        assert_eq!(d.p99, 4.0);
        assert_eq!(d.max, 4.0);
    }

    #[test]
    fn test_describe_interpolates_percentiles() {
        // 1..=5: rank(p) = p * 4
        let d = Describe::from_samples(&[5.0, 3.0, 1.0, 4.0, 2.0]).unwrap();
        assert_eq!(d.count, 5);
        assert_eq!(d.mean, 3.0);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 5.0);
        assert_eq!(d.p75, 4.0);
        assert!((d.p90 - 4.6).abs() < 1e-9);
        assert!((d.p95 - 4.8).abs() < 1e-9);
        assert!((d.p99 - 4.96).abs() < 1e-9);
        assert!((d.std - 2.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_rounded() {
        let d = Describe::from_samples(&[1.0, 2.0]).unwrap().rounded();
        assert_eq!(d.std, 0.71);
        assert_eq!(d.p75, 1.75);
        assert_eq!(d.p99, 1.99);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(5.0), 5.0);
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(2.5), 2.5);
        assert_eq!(round2(-0.125), -0.13);
        assert!(round2(f64::NAN).is_nan());
    }

    #[test]
    fn test_percentile_bounds() {
        let v = [10.0, 20.0];
        assert_eq!(percentile(&v, 0.0), 10.0);
        assert_eq!(percentile(&v, 1.0), 20.0);
        assert_eq!(percentile(&v, 0.5), 15.0);
        assert!(percentile(&[], 0.5).is_nan());
    }
}
