//! Behavioral tests for the focus engine

use chrono::{Duration as ChronoDuration, Utc};
use focus_sensor_agent::collector::{
    landmark_index as idx, CollectorConfig, FrameEvent, FrameSource, Landmark, LandmarkFrame,
    ReplayCollector,
};
use focus_sensor_agent::config::EngineConfig;
use focus_sensor_agent::core::{
    Classifier, DistractionType, EngineState, FocusEngine, FocusSample, GazeDirection,
    GazeSmoother, GazeVector, ReportBuilder, SessionRecorder, SignalReading, SmoothingConfig,
};
use focus_sensor_agent::core::classifier::ClassifierInput;
use focus_sensor_agent::core::smoothing::median;
use std::time::Duration;

fn reading(x: f64, y: f64) -> Option<SignalReading> {
    Some(SignalReading::new(GazeVector::new(x, y), 0.0, 0.5))
}

fn calibrated_at(x: f64, y: f64) -> FocusEngine {
    let mut engine = FocusEngine::default();
    for _ in 0..30 {
        engine.process_reading(reading(x, y));
    }
    assert!(engine.is_calibrated());
    engine
}

fn face(nose_dy: f64, iris_dx: f64) -> LandmarkFrame {
    let mut points = vec![Landmark::new(0.5, 0.5); idx::REFINED_MESH_LEN];
    points[idx::NOSE_TIP] = Landmark::new(0.5, 0.48 + nose_dy);
    points[idx::FOREHEAD] = Landmark::new(0.5, 0.2);
    points[idx::CHIN] = Landmark::new(0.5, 0.7);
    points[idx::LEFT_EYE_OUTER] = Landmark::new(0.40, 0.40);
    points[idx::LEFT_EYE_INNER] = Landmark::new(0.46, 0.40);
    points[idx::LEFT_EYE_TOP] = Landmark::new(0.43, 0.39);
    points[idx::LEFT_EYE_BOTTOM] = Landmark::new(0.43, 0.41);
    points[idx::RIGHT_EYE_INNER] = Landmark::new(0.54, 0.40);
    points[idx::RIGHT_EYE_OUTER] = Landmark::new(0.60, 0.40);
    points[idx::RIGHT_EYE_TOP] = Landmark::new(0.57, 0.39);
    points[idx::RIGHT_EYE_BOTTOM] = Landmark::new(0.57, 0.41);
    points[idx::LEFT_IRIS_CENTER] = Landmark::new(0.43 + iris_dx, 0.40);
    points[idx::RIGHT_IRIS_CENTER] = Landmark::new(0.57 + iris_dx, 0.40);
    LandmarkFrame::new(points)
}

/// Small deterministic xorshift generator for input sweeps.
struct Xorshift(u64);

impl Xorshift {
    fn next_f64(&mut self) -> f64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in [-range, range].
    fn symmetric(&mut self, range: f64) -> f64 {
        (self.next_f64() * 2.0 - 1.0) * range
    }
}

#[test]
fn test_centered_gaze_scores_full() {
    let mut engine = calibrated_at(0.0, 0.0);
    for _ in 0..5 {
        let sample = engine.process_reading(reading(0.01, -0.01));
        assert!(sample.is_face_detected);
        assert_eq!(sample.gaze_direction, GazeDirection::Center);
        assert_eq!(sample.focus_score, 100);
        assert_eq!(sample.distraction_type, None);
    }
}

#[test]
fn test_score_always_bounded() {
    let mut rng = Xorshift(0x9E37_79B9_7F4A_7C15);
    let mut engine = calibrated_at(0.0, 0.0);

    for _ in 0..2_000 {
        let sample = if rng.next_f64() < 0.1 {
            engine.process_reading(None)
        } else {
            engine.process_reading(Some(SignalReading::new(
                GazeVector::new(rng.symmetric(0.5), rng.symmetric(0.5)),
                rng.next_f64() * 0.2,
                rng.next_f64(),
            )))
        };
        assert!(sample.focus_score <= 100);
    }
}

#[test]
fn test_constant_offset_is_cancelled_by_calibration() {
    let mut engine = calibrated_at(0.2, -0.1);
    let sample = engine.process_reading(reading(0.2, -0.1));
    assert_eq!(sample.gaze_direction, GazeDirection::Center);
    assert_eq!(sample.focus_score, 100);
}

#[test]
fn test_phone_label_needs_sustained_downward_gaze() {
    let mut engine = calibrated_at(0.0, 0.0);
    for frame in 1..=5 {
        let sample = engine.process_reading(reading(0.0, 0.2));
        assert_eq!(sample.gaze_direction, GazeDirection::Down);
        assert_eq!(sample.distraction_type, None, "frame {frame}");
    }
    let sample = engine.process_reading(reading(0.0, 0.2));
    assert_eq!(sample.distraction_type, Some(DistractionType::UsingPhone));
    assert_eq!(engine.state(), EngineState::Distracted);
}

#[test]
fn test_label_onset_is_monotonic_in_debounce() {
    let onset = |debounce: u32| {
        let mut config = EngineConfig::default();
        config.classifier.moderate_debounce = debounce;
        let mut engine = FocusEngine::new(config);
        for _ in 0..30 {
            engine.process_reading(reading(0.0, 0.0));
        }
        (1..=50)
            .find(|_| engine.process_reading(reading(0.08, 0.0)).is_distracted())
            .unwrap_or(u32::MAX)
    };

    let onsets: Vec<u32> = [2, 4, 8, 12].iter().map(|d| onset(*d)).collect();
    assert_eq!(onsets, vec![3, 5, 9, 13]);
}

#[test]
fn test_stable_run_bonus_never_lowers_score() {
    let minor = ClassifierInput {
        gaze: GazeVector::new(0.05, 0.0),
        tilt: 0.0,
        in_good_range: false,
    };
    let centered = ClassifierInput {
        gaze: GazeVector::ZERO,
        ..minor
    };

    let fresh = Classifier::default().classify(&minor).raw_score;
    for run in [5, 11, 21, 40] {
        let mut classifier = Classifier::default();
        for _ in 0..run {
            classifier.classify(&centered);
        }
        assert!(classifier.classify(&minor).raw_score >= fresh, "run {run}");
    }
}

#[test]
fn test_face_loss_grace_period() {
    let mut engine = calibrated_at(0.0, 0.0);
    engine.process_reading(reading(0.0, 0.0));

    for frame in 1..=8 {
        let sample = engine.process(None);
        assert!(!sample.is_face_detected);
        assert_eq!(sample.gaze_direction, GazeDirection::Unknown);
        assert_eq!(sample.distraction_type, None, "frame {frame}");
        assert!(sample.focus_score >= 30);
    }

    let sample = engine.process(None);
    assert_eq!(
        sample.distraction_type,
        Some(DistractionType::FaceNotDetected)
    );
    assert_eq!(engine.state(), EngineState::FaceLost);

    // Reported zeros drag the smoothed score down
    let mut last = sample.focus_score;
    for _ in 0..10 {
        let next = engine.process(None).focus_score;
        assert!(next <= last);
        last = next;
    }
    assert_eq!(last, 0);
}

#[test]
fn test_face_return_ends_face_loss() {
    let mut engine = calibrated_at(0.0, 0.0);
    for _ in 0..12 {
        engine.process(None);
    }
    let sample = engine.process_reading(reading(0.0, 0.0));
    assert!(sample.is_face_detected);
    assert_eq!(sample.distraction_type, None);
    assert_eq!(engine.counters().face_lost_frames, 0);
}

#[test]
fn test_gaze_outliers_stay_near_median() {
    let mut rng = Xorshift(42);
    let config = SmoothingConfig::default();
    let mut smoother = GazeSmoother::new(&config);
    let mut xs = Vec::new();

    for i in 0..200 {
        let x = if i % 7 == 0 {
            rng.symmetric(1.0)
        } else {
            0.03 + rng.symmetric(0.02)
        };
        xs.push(x);
        if xs.len() > config.gaze_history {
            xs.remove(0);
        }

        let smoothed = smoother.push(GazeVector::new(x, 0.0));
        let m = median(&xs);
        assert!(
            (smoothed.x - m).abs() <= config.outlier_tolerance + 1e-12,
            "step {i}: smoothed {} median {m}",
            smoothed.x
        );
    }
}

#[test]
fn test_moderate_right_glance_after_centered_baseline() {
    let mut engine = calibrated_at(0.0, 0.0);
    let sample = engine.process_reading(reading(0.1, 0.0));

    assert!(sample.is_face_detected);
    assert_eq!(sample.gaze_direction, GazeDirection::Right);
    assert_eq!(sample.distraction_type, None);
    assert!((45..100).contains(&sample.focus_score), "{sample:?}");
}

#[test]
fn test_no_face_before_calibration_never_calibrates() {
    let mut engine = FocusEngine::default();
    for _ in 0..500 {
        assert_eq!(engine.process(None), FocusSample::calibrating());
    }
    assert!(!engine.is_calibrated());
    assert_eq!(engine.baseline(), None);
}

#[test]
fn test_engines_are_independent() {
    let mut a = calibrated_at(0.0, 0.0);
    let mut b = calibrated_at(0.0, 0.0);

    for _ in 0..10 {
        a.process_reading(reading(0.0, 0.2));
    }
    let sample = b.process_reading(reading(0.0, 0.0));
    assert_eq!(sample.focus_score, 100);
    assert_eq!(b.counters().distraction_frames, 0);
}

#[test]
fn test_landmark_stream_end_to_end() {
    let mut engine = FocusEngine::default();
    for _ in 0..30 {
        engine.process(Some(&face(0.0, 0.0)));
    }

    let sample = engine.process(Some(&face(0.0, 0.0)));
    assert_eq!(sample.gaze_direction, GazeDirection::Center);
    assert_eq!(sample.focus_score, 100);

    // A 0.02 iris shift on a 0.06 wide eye is well past the extreme threshold
    let mut last = sample;
    for _ in 0..6 {
        last = engine.process(Some(&face(0.0, 0.02)));
    }
    assert_eq!(last.gaze_direction, GazeDirection::Right);
    assert_eq!(last.distraction_type, Some(DistractionType::LookingAway));
}

#[test]
fn test_replayed_session_produces_report() {
    let start = Utc::now();
    let mut lines = Vec::new();
    for i in 0..150i64 {
        let timestamp = start + ChronoDuration::milliseconds(i * 100);
        let event = if (100..130).contains(&i) {
            FrameEvent {
                timestamp,
                landmarks: None,
            }
        } else {
            FrameEvent {
                timestamp,
                landmarks: Some(face(0.0, 0.0).points),
            }
        };
        lines.push(serde_json::to_string(&event).unwrap());
    }

    let path = std::env::temp_dir().join(format!(
        "focus-sensor-engine-test-{}.jsonl",
        uuid::Uuid::new_v4()
    ));
    std::fs::write(&path, lines.join("\n")).unwrap();

    let mut collector = ReplayCollector::new(CollectorConfig {
        source: FrameSource::File(path.clone()),
        fps: None,
    });
    collector.start().unwrap();

    let mut engine = FocusEngine::default();
    let mut recorder = SessionRecorder::new("replay", start, Duration::from_secs(1));
    let mut frames = 0;
    for event in collector.receiver().iter() {
        let sample = engine.process(event.frame().as_ref());
        recorder.record(event.timestamp, &sample);
        frames += 1;
    }
    collector.stop();
    let _ = std::fs::remove_file(&path);

    assert_eq!(frames, 150);
    assert_eq!(recorder.len(), 15);

    let report = ReportBuilder::new().build(&recorder, start + ChronoDuration::seconds(15));
    assert_eq!(report.summary.duration_secs, 15);
    // Seconds 10-12 have no face
    assert_eq!(report.summary.effective_duration_secs, 12);
    assert!(report.summary.average_score > 50.0);
}
