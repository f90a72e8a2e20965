//! Per-frame output of the focus engine.

use serde::{Deserialize, Serialize};

/// Coarse direction of the user's gaze or head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Center,
    Left,
    Right,
    Up,
    Down,
    Tilted,
    Unknown,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::Center => "center",
            GazeDirection::Left => "left",
            GazeDirection::Right => "right",
            GazeDirection::Up => "up",
            GazeDirection::Down => "down",
            GazeDirection::Tilted => "tilted",
            GazeDirection::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible distraction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistractionType {
    /// Sustained sharp downward look
    UsingPhone,
    /// Sustained extreme left/right look
    LookingAway,
    /// Sustained moderate deviation
    Distracted,
    /// Long-running small horizontal drift
    Wandering,
    /// Sustained head tilt without gaze shift
    HeadTilted,
    /// Face missing beyond the grace period
    FaceNotDetected,
}

impl DistractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistractionType::UsingPhone => "using_phone",
            DistractionType::LookingAway => "looking_away",
            DistractionType::Distracted => "distracted",
            DistractionType::Wandering => "wandering",
            DistractionType::HeadTilted => "head_tilted",
            DistractionType::FaceNotDetected => "face_not_detected",
        }
    }
}

impl std::fmt::Display for DistractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSample {
    pub is_face_detected: bool,
    pub gaze_direction: GazeDirection,
    /// Smoothed focus score in [0, 100]
    pub focus_score: u8,
    #[serde(default)]
    pub distraction_type: Option<DistractionType>,
}

impl FocusSample {
    /// The sample reported while the baseline is still being collected.
    pub fn calibrating() -> Self {
        Self {
            is_face_detected: true,
            gaze_direction: GazeDirection::Center,
            focus_score: 100,
            distraction_type: None,
        }
    }

    pub fn is_distracted(&self) -> bool {
        self.distraction_type.is_some()
    }
}
