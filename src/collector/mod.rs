//! Frame collection module for the Focus Sensor Agent.
//!
//! This module defines the landmark input boundary: the types delivered by
//! an external face-mesh extractor and a collector that streams them into
//! the scoring loop.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{CollectorConfig, CollectorError, FrameSource, ReplayCollector};
pub use types::{landmark_index, FrameEvent, Landmark, LandmarkFrame};

/// Platform-agnostic collector type alias
pub type Collector = ReplayCollector;
