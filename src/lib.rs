//! Focus Sensor Agent - camera-based study focus scoring.
//!
//! This library turns per-frame facial landmarks into a bounded focus
//! score with a gaze direction and a debounced distraction label, and
//! records sessions of those scores for later review.
//!
//! # Privacy Guarantees
//!
//! - **No images**: video frames never enter this crate, only landmarks
//! - **No landmark storage**: landmarks are discarded after scoring
//! - **Derived data only**: session records hold scores and directions
//! - **Transparency**: all processing is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Focus Sensor Agent                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐    │
//! │  │ Collector │──▶│             FocusEngine              │    │
//! │  │  (JSONL)  │   │ signal → calibration → smoothing →   │    │
//! │  └───────────┘   │ classifier → score smoothing         │    │
//! │        │         └──────────────────────────────────────┘    │
//! │        ▼                           │                         │
//! │  ┌─────────────┐           ┌───────────────┐  ┌──────────┐   │
//! │  │Transparency │           │SessionRecorder│─▶│  Report  │   │
//! │  │    Log      │           │  (1 / second) │  │ (export) │   │
//! │  └─────────────┘           └───────────────┘  └──────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use focus_sensor_agent::{collector, core};
//!
//! let config = collector::CollectorConfig {
//!     source: collector::FrameSource::from_arg("frames.jsonl"),
//!     fps: None,
//! };
//! let mut collector = collector::Collector::new(config);
//! collector.start().expect("Failed to open frame source");
//!
//! let mut engine = core::FocusEngine::default();
//! for event in collector.receiver().iter() {
//!     let sample = engine.process(event.frame().as_ref());
//!     println!("{} {}", sample.focus_score, sample.gaze_direction);
//! }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "verifier")]
pub mod verifier;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorConfig, CollectorError, FrameEvent, LandmarkFrame};
pub use config::{Config, ConfigError, EngineConfig};
pub use core::{
    DistractionType, EngineState, FocusEngine, FocusSample, GazeDirection, ReportBuilder,
    SessionRecorder, SessionReport,
};
pub use transparency::{Counter, SharedTransparencyLog, TransparencyLog, TransparencyStats};

// Verifier re-exports (when enabled)
#[cfg(feature = "verifier")]
pub use verifier::{
    BlockingVerifierClient, Verification, VerifierClient, VerifierConfig, VerifierError,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             FOCUS SENSOR AGENT - PRIVACY DECLARATION             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent estimates study focus from facial landmarks.         ║
║                                                                  ║
║  ✓ WHAT WE PROCESS:                                              ║
║    • Landmark coordinates of one face per frame                  ║
║    • Derived gaze direction and head tilt                        ║
║                                                                  ║
║  ✓ WHAT WE KEEP:                                                 ║
║    • One focus score and gaze direction per second               ║
║    • Distraction labels and their durations                      ║
║                                                                  ║
║  ✗ WHAT WE NEVER STORE:                                          ║
║    • Video frames, photos or screenshots                         ║
║    • Landmark coordinates after scoring                          ║
║    • Any screen or application content                           ║
║                                                                  ║
║  All scoring happens locally. Face verification, when used,      ║
║  sends a single snapshot to the verifier you configure.          ║
║                                                                  ║
║  You can view processing statistics anytime with:                ║
║    focus-sensor status                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
