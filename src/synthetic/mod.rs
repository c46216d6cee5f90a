//! Synthetic scored cohorts
//!
//! Generates labelled records whose score is the outcome plus bounded noise,
//! clipped to [0, 1], spread over the calibration-train, calibration-test and
//! development subsets. Used by the demo command, the benches and the tests.

use crate::records::ScoredRecord;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Seeded cohort generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortGenerator {
    /// Rows tagged 7 or 8 (alternating)
    pub n_calibration_train: usize,
    /// Rows tagged 9
    pub n_calibration_test: usize,
    /// Rows tagged 1..=6, outside every evaluation split
    pub n_development: usize,
    /// Probability of a positive outcome
    pub prevalence: f64,
    /// Half-width of the uniform noise added to the outcome
    ///
    /// Above 0.5 the two classes' score ranges overlap.
    pub noise: f64,
    /// Chance that a sentinel-filled attribute is missing
    pub missing_rate: f64,
    seed: Option<u64>,
}

impl Default for CohortGenerator {
    fn default() -> Self {
        Self {
            n_calibration_train: 60,
            n_calibration_test: 40,
            n_development: 0,
            prevalence: 0.3,
            noise: 0.7,
            missing_rate: 0.05,
            seed: None,
        }
    }
}

impl CohortGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sizes(mut self, calibration_train: usize, calibration_test: usize) -> Self {
        self.n_calibration_train = calibration_train;
        self.n_calibration_test = calibration_test;
        self
    }

    pub fn with_development_rows(mut self, n: usize) -> Self {
        self.n_development = n;
        self
    }

    pub fn with_prevalence(mut self, prevalence: f64) -> Self {
        self.prevalence = prevalence.clamp(0.0, 1.0);
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(0.0);
        self
    }

    /// Draw a cohort; ids are zero-padded so lexical order matches draw order
    pub fn generate(&self) -> Vec<ScoredRecord> {
        let mut rng = match self.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let train = (0..self.n_calibration_train).map(|i| 7 + (i % 2) as i32);
        let test = std::iter::repeat(9).take(self.n_calibration_test);
        let development: Vec<i32> = (0..self.n_development)
            .map(|_| rng.gen_range(1..=6))
            .collect();

        train
            .chain(test)
            .chain(development)
            .enumerate()
            .map(|(i, subset)| self.draw(&mut rng, format!("P{:06}", i), subset))
            .collect()
    }

    fn draw(&self, rng: &mut Xoshiro256PlusPlus, id: String, subset: i32) -> ScoredRecord {
        let y: u8 = if rng.gen_bool(self.prevalence) { 1 } else { 0 };
        let noise = if self.noise > 0.0 {
            rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        let score = (y as f64 + noise).clamp(0.0, 1.0);

        let age = rng.gen_range(18.0..90.0_f64).round();
        let sex = rng.gen_range(1..=2);
        let modality = self.maybe_missing(rng, 1..=3);
        let race = self.maybe_missing(rng, 1..=5);
        let ethnicity = self.maybe_missing(rng, 1..=2);

        ScoredRecord::new(id, subset, y, score).with_demographics(
            Some(age),
            Some(sex),
            modality,
            race,
            ethnicity,
        )
    }

    fn maybe_missing(
        &self,
        rng: &mut Xoshiro256PlusPlus,
        codes: std::ops::RangeInclusive<u32>,
    ) -> Option<u32> {
        let code = rng.gen_range(codes);
        if rng.gen_bool(self.missing_rate.clamp(0.0, 1.0)) {
            None
        } else {
            Some(code)
        }
    }
}
