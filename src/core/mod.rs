//! Core functionality for the Focus Sensor Agent.
//!
//! This module contains:
//! - The per-frame scoring pipeline (signal, calibration, smoothing,
//!   classification) behind [`FocusEngine`]
//! - Session recording and summaries
//! - Session report building for export

pub mod calibration;
pub mod classifier;
pub mod engine;
pub mod report;
pub mod sample;
pub mod session;
pub mod signal;
pub mod smoothing;

// Re-export commonly used types
pub use calibration::{CalibrationConfig, CalibrationStatus, Calibrator};
pub use classifier::{Classifier, ClassifierConfig, FrameCounters, Rule, ScoreCurve, RULES};
pub use engine::{EngineState, FocusEngine};
pub use report::{ReportBuilder, SessionReport, PRODUCER_NAME, REPORT_VERSION};
pub use sample::{DistractionType, FocusSample, GazeDirection};
pub use session::{DistractionEvent, FaceStatus, FocusDetail, SessionRecorder, SessionSummary};
pub use signal::{FrameRejection, GazeVector, SignalConfig, SignalProcessor, SignalReading};
pub use smoothing::{GazeSmoother, ScoreSmoother, SmoothingConfig};
