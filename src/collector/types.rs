//! Landmark input types for the Focus Sensor Agent.
//!
//! These types carry ONLY landmark coordinates produced by an external
//! face-mesh model - never image data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed MediaPipe face-mesh indices used by the scoring engine.
pub mod landmark_index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const CHIN: usize = 152;

    pub const LEFT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_INNER: usize = 133;
    pub const LEFT_EYE_TOP: usize = 159;
    pub const LEFT_EYE_BOTTOM: usize = 145;

    pub const RIGHT_EYE_OUTER: usize = 263;
    pub const RIGHT_EYE_INNER: usize = 362;
    pub const RIGHT_EYE_TOP: usize = 386;
    pub const RIGHT_EYE_BOTTOM: usize = 374;

    /// Iris centers only exist on refined (478-point) meshes.
    pub const LEFT_IRIS_CENTER: usize = 468;
    pub const RIGHT_IRIS_CENTER: usize = 473;

    /// Point count of a face mesh without iris refinement.
    pub const BASE_MESH_LEN: usize = 468;
    /// Point count of a refined face mesh.
    pub const REFINED_MESH_LEN: usize = 478;
}

/// A single landmark in normalized image space (x, y in [0, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Relative depth, if the extractor provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Euclidean distance in the image plane.
    pub fn distance(&self, other: &Landmark) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Midpoint in the image plane.
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One face's landmark set for a single video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub points: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    /// Look up a landmark by its face-mesh index.
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    /// Whether the mesh carries iris centers.
    pub fn has_iris(&self) -> bool {
        self.points.len() > landmark_index::RIGHT_IRIS_CENTER
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A frame event as delivered by the extractor: zero or one face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEvent {
    /// Capture time of the video frame
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Landmarks of the detected face, or `None` if no face was found
    #[serde(default)]
    pub landmarks: Option<Vec<Landmark>>,
}

impl FrameEvent {
    /// A frame with a detected face, stamped now.
    pub fn face(points: Vec<Landmark>) -> Self {
        Self {
            timestamp: Utc::now(),
            landmarks: Some(points),
        }
    }

    /// A frame in which no face was found, stamped now.
    pub fn no_face() -> Self {
        Self {
            timestamp: Utc::now(),
            landmarks: None,
        }
    }

    /// The landmark frame, if a face was detected.
    ///
    /// An empty landmark list is treated the same as no face.
    pub fn frame(&self) -> Option<LandmarkFrame> {
        self.landmarks
            .as_ref()
            .filter(|points| !points.is_empty())
            .map(|points| LandmarkFrame::new(points.clone()))
    }
}
