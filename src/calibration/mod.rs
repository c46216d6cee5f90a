//! Probability calibration
//!
//! - [`IsotonicRegression`]: monotone nondecreasing recalibration mapping
//! - [`IsotonicCalibrator`]: fits the mapping on the calibration-training
//!   subsets, applies it to the calibration-test subset and reports metrics
//!   before and after

mod calibrator;
mod isotonic;

pub use calibrator::{CalibrationOutcome, IsotonicCalibrator};
pub use isotonic::IsotonicRegression;

use crate::error::Result;
use ndarray::Array1;

/// Trait for probability calibrators
pub trait Calibrator: Send + Sync {
    /// Fit the calibrator on predicted probabilities and true labels
    fn fit(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<()>;

    /// Calibrate probabilities
    fn calibrate(&self, probs: &Array1<f64>) -> Result<Array1<f64>>;

    /// Fit and calibrate in one step
    fn fit_calibrate(&mut self, probs: &Array1<f64>, labels: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit(probs, labels)?;
        self.calibrate(probs)
    }
}
