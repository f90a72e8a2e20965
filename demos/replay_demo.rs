//! Demonstration of the focus engine on a scripted landmark stream.
//!
//! This example shows how to:
//! 1. Build landmark frames (here synthesized instead of read from a camera)
//! 2. Calibrate and score them with a `FocusEngine`
//! 3. Record one sample per second with a `SessionRecorder`
//! 4. Generate a session report
//!
//! Run with: cargo run --example replay_demo

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

use focus_sensor_agent::{
    collector::{landmark_index as idx, Landmark, LandmarkFrame},
    core::{FocusEngine, ReportBuilder, SessionRecorder},
    transparency::{Counter, TransparencyLog},
    PRIVACY_DECLARATION,
};

const FPS: i64 = 30;

/// A camera-facing refined mesh with the nose and irises shifted.
fn face(nose_dx: f64, nose_dy: f64, iris_dx: f64) -> LandmarkFrame {
    let mut points = vec![Landmark::new(0.5, 0.5); idx::REFINED_MESH_LEN];
    points[idx::NOSE_TIP] = Landmark::new(0.5 + nose_dx, 0.48 + nose_dy);
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

fn main() {
    println!("Focus Sensor Agent - Replay Demo");
    println!("================================");
    println!();
    println!("{PRIVACY_DECLARATION}");
    println!();

    // (phase, seconds, frame); None = no face in view
    let script: Vec<(&str, i64, Option<LandmarkFrame>)> = vec![
        ("calibrating", 2, Some(face(0.0, 0.0, 0.0))),
        ("reading", 5, Some(face(0.0, 0.0, 0.0))),
        ("glancing right", 2, Some(face(0.0, 0.0, 0.02))),
        ("looking at phone", 4, Some(face(0.0, 0.06, 0.0))),
        ("left the desk", 3, None),
        ("back to reading", 4, Some(face(0.0, 0.0, 0.0))),
    ];

    let mut engine = FocusEngine::default();
    let start = Utc::now();
    let mut recorder = SessionRecorder::new("demo", start, Duration::from_secs(1));
    let report_builder = ReportBuilder::new();
    let transparency_log = TransparencyLog::new();

    let mut frame_no: i64 = 0;
    for (phase, seconds, frame) in &script {
        println!("-- {phase}");
        for _ in 0..seconds * FPS {
            let timestamp = start + ChronoDuration::milliseconds(frame_no * 1_000 / FPS);
            frame_no += 1;

            let sample = engine.process(frame.as_ref());
            transparency_log.record_frame(frame.is_some());

            if recorder.record(timestamp, &sample) {
                transparency_log.increment(Counter::SamplesRecorded);
                println!(
                    "   t={:>2}s score {:>3} {:<7} {}",
                    (timestamp - start).num_seconds(),
                    sample.focus_score,
                    sample.gaze_direction,
                    sample
                        .distraction_type
                        .map(|d| d.to_string())
                        .unwrap_or_default()
                );
            }
        }
    }

    let ended_at = start + ChronoDuration::milliseconds(frame_no * 1_000 / FPS);
    let report = report_builder.build(&recorder, ended_at);
    transparency_log.increment(Counter::ReportsExported);

    println!();
    println!(
        "Average score {:.1} over {}s ({}s with a face in view)",
        report.summary.average_score,
        report.summary.duration_secs,
        report.summary.effective_duration_secs
    );
    for event in &report.distractions {
        println!(
            "  {:>2}s  {} for {}s",
            event.second, event.kind, event.duration_secs
        );
    }

    println!();
    println!("{}", transparency_log.summary());
}
