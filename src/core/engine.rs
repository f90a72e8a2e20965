//! The per-session focus scoring engine.
//!
//! A [`FocusEngine`] owns every piece of per-session state: the calibration
//! baseline, the smoothing buffers and the hysteresis counters. The host
//! calls it once per video frame and gets one [`FocusSample`] back. There
//! is no shared or global state; concurrent sessions use separate engines.

use crate::collector::types::LandmarkFrame;
use crate::config::EngineConfig;
use crate::core::calibration::{CalibrationStatus, Calibrator};
use crate::core::classifier::{Classifier, ClassifierInput, FrameCounters};
use crate::core::sample::{FocusSample, GazeDirection};
use crate::core::signal::{GazeVector, SignalProcessor, SignalReading};
use crate::core::smoothing::{GazeSmoother, ScoreSmoother};
use serde::{Deserialize, Serialize};

/// Coarse engine mode, derived from the counters and the last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum EngineState {
    Calibrating { collected: usize, required: usize },
    Focused,
    MinorDeviation,
    Distracted,
    FaceLost,
}

/// Gaze/focus scoring engine for one session.
pub struct FocusEngine {
    processor: SignalProcessor,
    calibrator: Calibrator,
    gaze_smoother: GazeSmoother,
    score_smoother: ScoreSmoother,
    classifier: Classifier,
    last_sample: FocusSample,
    rejected_frames: u64,
}

impl FocusEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            processor: SignalProcessor::new(config.signal.clone()),
            calibrator: Calibrator::new(&config.calibration),
            gaze_smoother: GazeSmoother::new(&config.smoothing),
            score_smoother: ScoreSmoother::new(&config.smoothing),
            classifier: Classifier::new(config.classifier),
            last_sample: FocusSample::calibrating(),
            rejected_frames: 0,
        }
    }

    /// Score one video frame; `None` means the extractor found no face.
    pub fn process(&mut self, frame: Option<&LandmarkFrame>) -> FocusSample {
        let Some(frame) = frame else {
            return self.process_reading(None);
        };

        match self.processor.measure(frame) {
            Ok(reading) => self.process_reading(Some(reading)),
            Err(rejection) => {
                tracing::debug!(%rejection, "frame skipped");
                self.rejected_frames += 1;
                self.last_sample
            }
        }
    }

    /// Score pre-extracted measurements; `None` means no face.
    pub fn process_reading(&mut self, reading: Option<SignalReading>) -> FocusSample {
        if let Some(r) = reading {
            if !r.gaze.is_finite() || !r.tilt.is_finite() {
                tracing::debug!("non-finite reading skipped");
                self.rejected_frames += 1;
                return self.last_sample;
            }
        }

        let sample = if self.calibrator.is_calibrated() {
            match reading {
                Some(reading) => self.score_detected(reading),
                None => self.score_face_lost(),
            }
        } else {
            if let Some(reading) = reading {
                self.calibrate(reading.gaze);
            }
            FocusSample::calibrating()
        };

        self.last_sample = sample;
        sample
    }

    fn calibrate(&mut self, raw: GazeVector) {
        match self.calibrator.observe(raw) {
            CalibrationStatus::Completed(baseline) => {
                tracing::info!(
                    baseline_x = baseline.x,
                    baseline_y = baseline.y,
                    "calibration complete"
                );
            }
            CalibrationStatus::Collecting {
                collected,
                required,
            } => {
                tracing::trace!(collected, required, "calibrating");
            }
            CalibrationStatus::Frozen(_) => {}
        }
    }

    fn score_detected(&mut self, reading: SignalReading) -> FocusSample {
        let corrected = self.calibrator.correct(reading.gaze);
        let smoothed = self.gaze_smoother.push(corrected);

        let input = ClassifierInput {
            gaze: smoothed,
            tilt: reading.tilt,
            in_good_range: self.processor.config().in_good_range(reading.face_height),
        };
        let verdict = self.classifier.classify(&input);

        FocusSample {
            is_face_detected: true,
            gaze_direction: verdict.direction,
            focus_score: self.score_smoother.push(verdict.raw_score),
            distraction_type: verdict.label,
        }
    }

    fn score_face_lost(&mut self) -> FocusSample {
        let verdict = self
            .classifier
            .face_lost(f64::from(self.last_sample.focus_score));

        FocusSample {
            is_face_detected: false,
            gaze_direction: GazeDirection::Unknown,
            focus_score: self.score_smoother.push(verdict.raw_score),
            distraction_type: verdict.label,
        }
    }

    /// Current mode of the engine.
    pub fn state(&self) -> EngineState {
        if !self.calibrator.is_calibrated() {
            return EngineState::Calibrating {
                collected: self.calibrator.collected(),
                required: self.calibrator.required(),
            };
        }
        if self.classifier.counters().face_lost_frames > 0 {
            EngineState::FaceLost
        } else if self.last_sample.distraction_type.is_some() {
            EngineState::Distracted
        } else if self.last_sample.gaze_direction == GazeDirection::Center {
            EngineState::Focused
        } else {
            EngineState::MinorDeviation
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    pub fn baseline(&self) -> Option<GazeVector> {
        self.calibrator.baseline()
    }

    pub fn counters(&self) -> FrameCounters {
        self.classifier.counters()
    }

    /// Frames skipped because they could not be measured.
    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }

    /// The most recently emitted sample.
    pub fn last_sample(&self) -> FocusSample {
        self.last_sample
    }
}

impl Default for FocusEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{landmark_index as idx, Landmark};
    use crate::core::sample::DistractionType;
    use crate::core::signal::test_faces::face;

    fn reading(x: f64, y: f64) -> Option<SignalReading> {
        Some(SignalReading::new(GazeVector::new(x, y), 0.0, 0.5))
    }

    fn calibrated_engine() -> FocusEngine {
        let mut engine = FocusEngine::default();
        for _ in 0..30 {
            engine.process_reading(reading(0.0, 0.0));
        }
        engine
    }

    #[test]
    fn test_calibrating_sample_until_baseline() {
        let mut engine = FocusEngine::default();
        for _ in 0..29 {
            let sample = engine.process_reading(reading(0.3, 0.3));
            assert_eq!(sample, FocusSample::calibrating());
        }
        assert!(!engine.is_calibrated());
        engine.process_reading(reading(0.3, 0.3));
        assert!(engine.is_calibrated());
        assert_eq!(engine.baseline(), Some(GazeVector::new(0.3, 0.3)));
    }

    #[test]
    fn test_no_face_during_calibration_is_not_counted() {
        let mut engine = FocusEngine::default();
        for _ in 0..100 {
            assert_eq!(engine.process(None), FocusSample::calibrating());
        }
        assert_eq!(
            engine.state(),
            EngineState::Calibrating {
                collected: 0,
                required: 30
            }
        );
    }

    #[test]
    fn test_rejected_frame_keeps_previous_sample() {
        let mut engine = calibrated_engine();
        let before = engine.process_reading(reading(0.07, 0.0));
        let counters = engine.counters();

        let mut bad = face(0.0, 0.0);
        bad.points[idx::RIGHT_EYE_INNER] = Landmark::new(0.599, 0.40);
        assert_eq!(engine.process(Some(&bad)), before);
        assert_eq!(engine.counters(), counters);
        assert_eq!(engine.rejected_frames(), 1);
    }

    #[test]
    fn test_non_finite_reading_is_skipped() {
        let mut engine = calibrated_engine();
        let before = engine.last_sample();
        let sample = engine.process_reading(reading(f64::NAN, 0.0));
        assert_eq!(sample, before);
    }

    #[test]
    fn test_landmark_frames_calibrate_and_score() {
        let mut engine = FocusEngine::default();
        for _ in 0..30 {
            engine.process(Some(&face(0.0, 0.0)));
        }
        assert!(engine.is_calibrated());

        let sample = engine.process(Some(&face(0.0, 0.0)));
        assert!(sample.is_face_detected);
        assert_eq!(sample.gaze_direction, GazeDirection::Center);
        assert_eq!(sample.focus_score, 100);
        assert_eq!(engine.state(), EngineState::Focused);
    }

    #[test]
    fn test_state_tracks_distraction_and_face_loss() {
        let mut engine = calibrated_engine();
        engine.process_reading(reading(0.045, 0.0));
        assert_eq!(engine.state(), EngineState::MinorDeviation);

        for _ in 0..6 {
            engine.process_reading(reading(0.0, 0.2));
        }
        assert_eq!(
            engine.last_sample().distraction_type,
            Some(DistractionType::UsingPhone)
        );
        assert_eq!(engine.state(), EngineState::Distracted);

        engine.process(None);
        assert_eq!(engine.state(), EngineState::FaceLost);
    }
}
