//! Per-session neutral gaze calibration.
//!
//! The first frames of a session establish the user's resting gaze, which
//! absorbs individual head position and camera angle. The baseline is the
//! per-axis median of the collected samples and is frozen afterwards.

use crate::core::signal::GazeVector;
use crate::core::smoothing::median;
use serde::{Deserialize, Serialize};

/// Tunables for calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Detected frames collected before the baseline is frozen
    pub frames: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { frames: 30 }
    }
}

/// Result of feeding one sample to the calibrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationStatus {
    /// Still collecting; `collected` of `required` samples so far
    Collecting { collected: usize, required: usize },
    /// This sample completed calibration
    Completed(GazeVector),
    /// Calibration had already completed; the sample was ignored
    Frozen(GazeVector),
}

/// Collects raw gaze samples until the baseline can be computed.
#[derive(Debug, Clone)]
pub struct Calibrator {
    required: usize,
    samples: Vec<GazeVector>,
    baseline: Option<GazeVector>,
}

impl Calibrator {
    pub fn new(config: &CalibrationConfig) -> Self {
        let required = config.frames.max(1);
        Self {
            required,
            samples: Vec::with_capacity(required),
            baseline: None,
        }
    }

    /// Feed one raw gaze sample from a frame with a detected face.
    pub fn observe(&mut self, raw: GazeVector) -> CalibrationStatus {
        if let Some(baseline) = self.baseline {
            return CalibrationStatus::Frozen(baseline);
        }

        self.samples.push(raw);
        if self.samples.len() < self.required {
            return CalibrationStatus::Collecting {
                collected: self.samples.len(),
                required: self.required,
            };
        }

        let xs: Vec<f64> = self.samples.iter().map(|g| g.x).collect();
        let ys: Vec<f64> = self.samples.iter().map(|g| g.y).collect();
        let baseline = GazeVector::new(median(&xs), median(&ys));

        self.baseline = Some(baseline);
        self.samples = Vec::new();
        CalibrationStatus::Completed(baseline)
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<GazeVector> {
        self.baseline
    }

    /// Samples collected so far (0 once calibrated).
    pub fn collected(&self) -> usize {
        self.samples.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Subtract the baseline from a raw vector.
    ///
    /// Before calibration completes the vector is returned unchanged.
    pub fn correct(&self, raw: GazeVector) -> GazeVector {
        match self.baseline {
            Some(baseline) => raw - baseline,
            None => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_samples_become_baseline() {
        let mut calibrator = Calibrator::new(&CalibrationConfig::default());
        let g = GazeVector::new(0.02, 0.07);

        for i in 1..30 {
            assert_eq!(
                calibrator.observe(g),
                CalibrationStatus::Collecting {
                    collected: i,
                    required: 30
                }
            );
        }
        assert_eq!(calibrator.observe(g), CalibrationStatus::Completed(g));
        assert!(calibrator.is_calibrated());
        assert_eq!(calibrator.correct(g), GazeVector::ZERO);
    }

    #[test]
    fn test_median_resists_outliers() {
        let mut calibrator = Calibrator::new(&CalibrationConfig { frames: 5 });
        for g in [
            GazeVector::new(0.01, 0.05),
            GazeVector::new(0.01, 0.05),
            GazeVector::new(0.5, -0.4),
            GazeVector::new(0.01, 0.05),
        ] {
            calibrator.observe(g);
        }
        let status = calibrator.observe(GazeVector::new(0.01, 0.05));
        assert_eq!(status, CalibrationStatus::Completed(GazeVector::new(0.01, 0.05)));
    }

    #[test]
    fn test_baseline_is_frozen() {
        let mut calibrator = Calibrator::new(&CalibrationConfig { frames: 1 });
        let first = GazeVector::new(0.1, 0.1);
        calibrator.observe(first);

        assert_eq!(
            calibrator.observe(GazeVector::new(0.9, 0.9)),
            CalibrationStatus::Frozen(first)
        );
        assert_eq!(calibrator.baseline(), Some(first));
    }

    #[test]
    fn test_uncalibrated_correction_is_identity() {
        let calibrator = Calibrator::new(&CalibrationConfig::default());
        let g = GazeVector::new(0.3, -0.2);
        assert_eq!(calibrator.correct(g), g);
        assert_eq!(calibrator.collected(), 0);
    }
}
