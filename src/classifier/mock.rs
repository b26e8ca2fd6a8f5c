// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Randomized stand-in for the classification API, used in debug mode

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use super::{Classification, Classifier, ClassifyError, Confidence};

/// Share of mock calls that report failure unless configured otherwise
pub const DEFAULT_FAILURE_RATE: f64 = 0.33;

pub const MOCK_CLASS_ID: i64 = 3;
pub const MOCK_CONFIDENCE: u16 = 9500;
pub const MOCK_SUCCESS_MESSAGE: &str = "Test analysis succeeded";
pub const MOCK_FAILURE_MESSAGE: &str = "Test error";

/// Mock classifier with an injectable random source
pub struct MockClassifier {
    failure_rate: f64,
    rng: Mutex<StdRng>,
}

impl MockClassifier {
    /// Mock seeded from the operating system
    pub fn new(failure_rate: f64) -> Self {
        Self::from_rng(failure_rate, StdRng::from_os_rng())
    }

    /// Mock producing the same sequence for the same seed
    pub fn with_seed(failure_rate: f64, seed: u64) -> Self {
        Self::from_rng(failure_rate, StdRng::seed_from_u64(seed))
    }

    fn from_rng(failure_rate: f64, rng: StdRng) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Draw one outcome; shared by the async trait method and tests
    pub fn draw(&self) -> Classification {
        let roll: f64 = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.random()
        };

        if roll < self.failure_rate {
            Classification::Failure {
                message: MOCK_FAILURE_MESSAGE.to_string(),
            }
        } else {
            Classification::Success {
                class_id: MOCK_CLASS_ID,
                confidence: Confidence(MOCK_CONFIDENCE),
                message: MOCK_SUCCESS_MESSAGE.to_string(),
            }
        }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_RATE)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn classify(&self, _image_path: &str) -> Result<Classification, ClassifyError> {
        Ok(self.draw())
    }
}
