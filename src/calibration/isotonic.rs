//! Isotonic regression calibration

use crate::calibration::Calibrator;
use crate::config::OutOfBounds;
use crate::error::{EvalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Isotonic regression calibrator
///
/// Non-parametric calibration that fits a monotonically nondecreasing
/// function by pool-adjacent-violators. The fitted function is stored as
/// knots at block boundaries and interpolated linearly between them; inputs
/// outside the training range follow the [`OutOfBounds`] policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicRegression {
    /// Knot positions (raw scores), strictly ascending
    x_knots: Option<Vec<f64>>,
    /// Calibrated probability at each knot, nondecreasing
    y_knots: Option<Vec<f64>>,
    out_of_bounds: OutOfBounds,
    /// Number of training pairs seen by `fit`
    n_train: usize,
}

/// A pooled block of equal fitted value
#[derive(Debug, Clone, Copy)]
struct Block {
    sum_wy: f64,
    weight: f64,
    /// Number of unique x values covered
    len: usize,
}

impl Block {
    fn mean(&self) -> f64 {
        self.sum_wy / self.weight
    }
}

impl IsotonicRegression {
    /// Create a new isotonic regression calibrator that clips out-of-range input
    pub fn new() -> Self {
        Self {
            x_knots: None,
            y_knots: None,
            out_of_bounds: OutOfBounds::Clip,
            n_train: 0,
        }
    }

    /// Set the policy for inputs outside the training range
    pub fn with_out_of_bounds(mut self, policy: OutOfBounds) -> Self {
        self.out_of_bounds = policy;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.x_knots.is_some()
    }

    /// Fitted knots as (scores, calibrated probabilities)
    pub fn knots(&self) -> Option<(&[f64], &[f64])> {
        match (&self.x_knots, &self.y_knots) {
            (Some(x), Some(y)) => Some((x.as_slice(), y.as_slice())),
            _ => None,
        }
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// Pool Adjacent Violators Algorithm (PAVA)
    ///
    /// Returns the fitted value for every input position.
    fn pava(y: &[f64], weights: &[f64]) -> Vec<f64> {
        let mut blocks: Vec<Block> = Vec::with_capacity(y.len());

        for (&yi, &wi) in y.iter().zip(weights.iter()) {
            blocks.push(Block {
                sum_wy: yi * wi,
                weight: wi,
                len: 1,
            });
            // Merge backwards while the last two blocks violate monotonicity
            while blocks.len() > 1 {
                let last = blocks[blocks.len() - 1];
                let prev = blocks[blocks.len() - 2];
                if prev.mean() <= last.mean() {
                    break;
                }
                blocks.pop();
                if let Some(merged) = blocks.last_mut() {
                    merged.sum_wy += last.sum_wy;
                    merged.weight += last.weight;
                    merged.len += last.len;
                }
            }
        }

        blocks
            .iter()
            .flat_map(|b| std::iter::repeat(b.mean()).take(b.len))
            .collect()
    }

    /// Sort by x and average the outcomes of tied x values
    fn unique_weighted(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut order: Vec<usize> = (0..x.len()).collect();
        order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal));

        let mut xs: Vec<f64> = Vec::new();
        let mut ys: Vec<f64> = Vec::new();
        let mut ws: Vec<f64> = Vec::new();
        for i in order {
            match xs.last() {
                Some(&last) if last == x[i] => {
                    let k = ys.len() - 1;
                    ys[k] += y[i];
                    ws[k] += 1.0;
                }
                _ => {
                    xs.push(x[i]);
                    ys.push(y[i]);
                    ws.push(1.0);
                }
            }
        }
        for (sum, w) in ys.iter_mut().zip(ws.iter()) {
            *sum /= w;
        }
        (xs, ys, ws)
    }

    /// Keep only the points where the fitted value changes on either side
    fn build_function(&mut self, x_unique: Vec<f64>, y_fitted: Vec<f64>) {
        let n = x_unique.len();
        let mut x_vals = Vec::new();
        let mut y_vals = Vec::new();

        for i in 0..n {
            let keep = i == 0
                || i == n - 1
                || y_fitted[i] != y_fitted[i - 1]
                || y_fitted[i] != y_fitted[i + 1];
            if keep {
                x_vals.push(x_unique[i]);
                y_vals.push(y_fitted[i]);
            }
        }

        self.x_knots = Some(x_vals);
        self.y_knots = Some(y_vals);
    }

    /// Calibrated probability for a single raw score
    pub fn transform_one(&self, x: f64) -> Result<f64> {
        let (x_vals, y_vals) = self.knots().ok_or(EvalError::ModelNotFitted)?;
        if x.is_nan() {
            return Ok(f64::NAN);
        }

        let first = x_vals[0];
        let last = x_vals[x_vals.len() - 1];
        let x = if x < first || x > last {
            match self.out_of_bounds {
                OutOfBounds::Clip => x.clamp(first, last),
                OutOfBounds::Nan => return Ok(f64::NAN),
            }
        } else {
            x
        };

        Ok(Self::interpolate(x_vals, y_vals, x))
    }

    /// Linear interpolation between the knots surrounding `x`
    fn interpolate(x_vals: &[f64], y_vals: &[f64], x: f64) -> f64 {
        if x_vals.len() == 1 || x <= x_vals[0] {
            return y_vals[0];
        }
        if x >= x_vals[x_vals.len() - 1] {
            return y_vals[y_vals.len() - 1];
        }

        // Binary search for interval
        let hi = x_vals.partition_point(|&k| k <= x);
        let lo = hi - 1;
        if x == x_vals[lo] {
            return y_vals[lo];
        }

        let t = (x - x_vals[lo]) / (x_vals[hi] - x_vals[lo]);
        y_vals[lo] + t * (y_vals[hi] - y_vals[lo])
    }
}

impl Default for IsotonicRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator for IsotonicRegression {
    fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = probs.len();
        if n != labels.len() {
            return Err(EvalError::InvalidInput(
                "Probabilities and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(EvalError::InvalidInput("Empty input".to_string()));
        }
        if probs.iter().chain(labels.iter()).any(|v| !v.is_finite()) {
            return Err(EvalError::InvalidInput(
                "Calibration inputs must be finite".to_string(),
            ));
        }

        let x: Vec<f64> = probs.to_vec();
        let y: Vec<f64> = labels.to_vec();
        let (x_unique, y_mean, weights) = Self::unique_weighted(&x, &y);

        let y_fitted = Self::pava(&y_mean, &weights);
        self.build_function(x_unique, y_fitted);
        self.n_train = n;

        Ok(())
    }

    fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(EvalError::ModelNotFitted);
        }
        probs
            .iter()
            .map(|&p| self.transform_one(p))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_monotone(values: &Array1<f64>) {
        for i in 1..values.len() {
            assert!(values[i] >= values[i - 1] - 1e-12, "{:?}", values);
        }
    }

    #[test]
    fn test_isotonic_basic() {
        let probs = array![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
        let labels = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut calibrator = IsotonicRegression::new();
        let calibrated = calibrator.fit_calibrate(&probs, &labels).unwrap();

        assert_monotone(&calibrated);
        assert_eq!(calibrated[0], 0.0);
        assert_eq!(calibrated[8], 1.0);
    }

    #[test]
    fn test_isotonic_non_monotonic_input() {
        let probs = array![0.1, 0.3, 0.5, 0.7, 0.9];
        let labels = array![0.0, 1.0, 0.0, 1.0, 1.0];

        let mut calibrator = IsotonicRegression::new();
        let calibrated = calibrator.fit_calibrate(&probs, &labels).unwrap();

        assert_monotone(&calibrated);
        // 0.3 and 0.5 pool to 0.5
        assert!((calibrated[1] - 0.5).abs() < 1e-12);
        assert!((calibrated[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_pava_pools_long_runs() {
        let y = vec![1.0, 1.0, 0.0, 0.0, 0.0];
        let w = vec![1.0; 5];
        let result = IsotonicRegression::pava(&y, &w);
        for v in &result {
            assert!((v - 0.4).abs() < 1e-12, "{:?}", result);
        }
    }

    #[test]
    fn test_tied_scores_share_one_value() {
        let probs = array![0.4, 0.4, 0.4, 0.8];
        let labels = array![0.0, 1.0, 1.0, 1.0];

        let mut calibrator = IsotonicRegression::new();
        calibrator.fit(&probs, &labels).unwrap();
        assert!((calibrator.transform_one(0.4).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_is_clipped() {
        let probs = array![0.2, 0.4, 0.6, 0.8];
        let labels = array![0.0, 0.0, 1.0, 1.0];

        let mut calibrator = IsotonicRegression::new();
        calibrator.fit(&probs, &labels).unwrap();
        assert_eq!(calibrator.transform_one(0.0).unwrap(), 0.0);
        assert_eq!(calibrator.transform_one(1.0).unwrap(), 1.0);
        // halfway between knots 0.4 -> 0 and 0.6 -> 1
        assert!((calibrator.transform_one(0.5).unwrap() - 0.5).abs() < 1e-12);

        let mut strict = IsotonicRegression::new().with_out_of_bounds(OutOfBounds::Nan);
        strict.fit(&probs, &labels).unwrap();
        assert!(strict.transform_one(0.95).unwrap().is_nan());
    }

    #[test]
    fn test_knots_drop_interior_points() {
        let probs = array![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut calibrator = IsotonicRegression::new();
        calibrator.fit(&probs, &labels).unwrap();
        let (x, y) = calibrator.knots().unwrap();
        assert_eq!(x, &[0.1, 0.3, 0.4, 0.6]);
        assert_eq!(y, &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unfitted_and_invalid() {
        let calibrator = IsotonicRegression::new();
        assert!(matches!(
            calibrator.calibrate(&array![0.5]),
            Err(EvalError::ModelNotFitted)
        ));

        let mut calibrator = IsotonicRegression::new();
        assert!(calibrator.fit(&array![0.1, 0.2], &array![1.0]).is_err());
        assert!(calibrator.fit(&array![], &array![]).is_err());
    }

    #[test]
    fn test_single_unique_score() {
        let mut calibrator = IsotonicRegression::new();
        calibrator
            .fit(&array![0.3, 0.3, 0.3, 0.3], &array![0.0, 1.0, 0.0, 0.0])
            .unwrap();
        assert!((calibrator.transform_one(0.9).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let mut calibrator = IsotonicRegression::new();
        calibrator
            .fit(&array![0.1, 0.5, 0.9], &array![0.0, 1.0, 1.0])
            .unwrap();
        let json = serde_json::to_string(&calibrator).unwrap();
        let restored: IsotonicRegression = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, calibrator);
        assert_eq!(
            restored.transform_one(0.3).unwrap(),
            calibrator.transform_one(0.3).unwrap()
        );
    }
}
