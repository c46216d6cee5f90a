//! Fixed-boundary bucketing
//!
//! Buckets are right-closed intervals `(e[i], e[i+1]]` over an ascending edge
//! list. A value on or below the first edge, above the last edge, or NaN
//! belongs to no bucket.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// Ascending bucket edges with one label per bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinEdges<L> {
    edges: Vec<f64>,
    labels: Vec<L>,
}

impl<L: Clone> BinEdges<L> {
    /// Create bucket edges; `labels.len()` must equal `edges.len() - 1`.
    pub fn new(edges: Vec<f64>, labels: Vec<L>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(EvalError::ConfigError(
                "At least two bin edges are required".to_string(),
            ));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(EvalError::ConfigError("Bin edges must be finite".to_string()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(EvalError::ConfigError(format!(
                "Bin edges must be strictly ascending: {:?}",
                edges
            )));
        }
        if labels.len() != edges.len() - 1 {
            return Err(EvalError::ConfigError(format!(
                "Expected {} bin labels, got {}",
                edges.len() - 1,
                labels.len()
            )));
        }
        Ok(Self { edges, labels })
    }

    /// Index of the bucket holding `x`, if any
    pub fn assign(&self, x: f64) -> Option<usize> {
        // first edge >= x; NaN compares false everywhere and lands on 0
        let idx = self.edges.partition_point(|&e| e < x);
        if idx == 0 || idx == self.edges.len() {
            None
        } else {
            Some(idx - 1)
        }
    }

    /// Label of the bucket holding `x`, if any
    pub fn label_for(&self, x: f64) -> Option<&L> {
        self.assign(x).map(|i| &self.labels[i])
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    pub fn n_bins(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deciles() -> BinEdges<&'static str> {
        BinEdges::new(
            vec![-0.1, 0.09, 0.19, 0.29],
            vec!["0-0.09", "0.1-0.19", "0.2-0.29"],
        )
        .unwrap()
    }

    #[test]
    fn test_right_closed_boundaries() {
        let bins = deciles();
        assert_eq!(bins.label_for(0.09), Some(&"0-0.09"));
        assert_eq!(bins.label_for(0.0900001), Some(&"0.1-0.19"));
        assert_eq!(bins.label_for(0.29), Some(&"0.2-0.29"));
        assert_eq!(bins.label_for(0.0), Some(&"0-0.09"));
    }

    #[test]
    fn test_outside_values() {
        let bins = deciles();
        assert_eq!(bins.assign(-0.1), None);
        assert_eq!(bins.assign(-0.5), None);
        assert_eq!(bins.assign(0.2901), None);
        assert_eq!(bins.assign(f64::NAN), None);
    }

    #[test]
    fn test_rejects_bad_edges() {
        assert!(BinEdges::new(vec![0.0, 0.0, 1.0], vec![1, 2]).is_err());
        assert!(BinEdges::new(vec![0.0, 1.0], vec![1, 2]).is_err());
        assert!(BinEdges::new(vec![0.0], Vec::<u32>::new()).is_err());
    }
}
