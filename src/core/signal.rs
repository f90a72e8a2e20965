//! Gaze and head-tilt measurement from facial landmarks.
//!
//! One landmark frame becomes one [`SignalReading`]: a raw (not yet
//! baseline-corrected) gaze vector blending head pose with iris position,
//! a head-tilt scalar, and the normalized face height.

use crate::collector::types::{landmark_index as idx, Landmark, LandmarkFrame};
use serde::{Deserialize, Serialize};

/// Deviation from a neutral, camera-facing gaze in normalized image units.
///
/// Positive x looks right, positive y looks down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeVector {
    pub x: f64,
    pub y: f64,
}

impl GazeVector {
    pub const ZERO: GazeVector = GazeVector { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Sub for GazeVector {
    type Output = GazeVector;

    fn sub(self, rhs: GazeVector) -> GazeVector {
        GazeVector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Measurements extracted from a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    /// Raw gaze, before baseline correction
    pub gaze: GazeVector,
    /// Head rotation/tilt indicator (0 = nose centered between the eyes)
    pub tilt: f64,
    /// Forehead-to-chin distance, normalized
    pub face_height: f64,
}

impl SignalReading {
    pub fn new(gaze: GazeVector, tilt: f64, face_height: f64) -> Self {
        Self {
            gaze,
            tilt,
            face_height,
        }
    }
}

/// Why a frame could not be measured.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRejection {
    /// An expected face-mesh index is missing from the frame
    MissingLandmark(usize),
    /// A coordinate is NaN or infinite
    NonFinite,
    /// An eye is implausibly narrow or wide (occlusion, extreme angle)
    EyeWidthOutOfRange { left: f64, right: f64 },
}

impl std::fmt::Display for FrameRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRejection::MissingLandmark(i) => write!(f, "missing landmark {i}"),
            FrameRejection::NonFinite => write!(f, "non-finite landmark coordinate"),
            FrameRejection::EyeWidthOutOfRange { left, right } => {
                write!(f, "implausible eye widths (left {left:.3}, right {right:.3})")
            }
        }
    }
}

/// Tunables for the signal processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Smallest plausible eye width
    pub min_eye_width: f64,
    /// Largest plausible eye width
    pub max_eye_width: f64,
    /// Floor for eye height when normalizing vertical iris offset
    pub min_eye_height: f64,
    /// Head-pose weight on the horizontal axis (iris gets the rest)
    pub head_weight_x: f64,
    /// Head-pose weight on the vertical axis (iris gets the rest)
    pub head_weight_y: f64,
    /// Face height range that earns the distance bonus
    pub good_face_height_min: f64,
    pub good_face_height_max: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_eye_width: 0.02,
            max_eye_width: 0.15,
            min_eye_height: 0.005,
            head_weight_x: 0.4,
            head_weight_y: 0.7,
            good_face_height_min: 0.2,
            good_face_height_max: 0.7,
        }
    }
}

impl SignalConfig {
    /// Whether the face sits at a comfortable distance from the camera.
    pub fn in_good_range(&self, face_height: f64) -> bool {
        (self.good_face_height_min..=self.good_face_height_max).contains(&face_height)
    }
}

/// Converts landmark frames into gaze readings.
#[derive(Debug, Clone, Default)]
pub struct SignalProcessor {
    config: SignalConfig,
}

struct Eye {
    outer: Landmark,
    inner: Landmark,
    top: Landmark,
    bottom: Landmark,
}

impl Eye {
    fn width(&self) -> f64 {
        self.outer.distance(&self.inner)
    }

    fn height(&self) -> f64 {
        (self.top.y - self.bottom.y).abs()
    }

    /// Iris offset normalized by eye size.
    fn iris_offset(&self, iris: &Landmark, min_height: f64) -> GazeVector {
        let corner_center = self.outer.midpoint(&self.inner);
        let lid_center_y = (self.top.y + self.bottom.y) / 2.0;
        GazeVector::new(
            (iris.x - corner_center.x) / self.width(),
            (iris.y - lid_center_y) / self.height().max(min_height),
        )
    }
}

impl SignalProcessor {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Measure one frame.
    pub fn measure(&self, frame: &LandmarkFrame) -> Result<SignalReading, FrameRejection> {
        let point = |index: usize| -> Result<Landmark, FrameRejection> {
            let p = frame
                .get(index)
                .copied()
                .ok_or(FrameRejection::MissingLandmark(index))?;
            if p.is_finite() {
                Ok(p)
            } else {
                Err(FrameRejection::NonFinite)
            }
        };

        let nose = point(idx::NOSE_TIP)?;
        let forehead = point(idx::FOREHEAD)?;
        let chin = point(idx::CHIN)?;

        let left = Eye {
            outer: point(idx::LEFT_EYE_OUTER)?,
            inner: point(idx::LEFT_EYE_INNER)?,
            top: point(idx::LEFT_EYE_TOP)?,
            bottom: point(idx::LEFT_EYE_BOTTOM)?,
        };
        let right = Eye {
            outer: point(idx::RIGHT_EYE_OUTER)?,
            inner: point(idx::RIGHT_EYE_INNER)?,
            top: point(idx::RIGHT_EYE_TOP)?,
            bottom: point(idx::RIGHT_EYE_BOTTOM)?,
        };

        let plausible = self.config.min_eye_width..=self.config.max_eye_width;
        let (left_width, right_width) = (left.width(), right.width());
        if !plausible.contains(&left_width) || !plausible.contains(&right_width) {
            return Err(FrameRejection::EyeWidthOutOfRange {
                left: left_width,
                right: right_width,
            });
        }

        // Crude yaw/pitch proxy: where the nose points relative to the eye line
        let eye_mid = left.outer.midpoint(&right.outer);
        let head = GazeVector::new(nose.x - eye_mid.x, nose.y - eye_mid.y);

        let gaze = if frame.has_iris() {
            let left_iris = point(idx::LEFT_IRIS_CENTER)?;
            let right_iris = point(idx::RIGHT_IRIS_CENTER)?;
            let l = left.iris_offset(&left_iris, self.config.min_eye_height);
            let r = right.iris_offset(&right_iris, self.config.min_eye_height);
            let iris = GazeVector::new((l.x + r.x) / 2.0, (l.y + r.y) / 2.0);

            let wx = self.config.head_weight_x;
            let wy = self.config.head_weight_y;
            GazeVector::new(
                wx * head.x + (1.0 - wx) * iris.x,
                wy * head.y + (1.0 - wy) * iris.y,
            )
        } else {
            head
        };

        let mean_x = (left.outer.x + right.outer.x + nose.x) / 3.0;
        let tilt = (nose.x - mean_x).abs();
        let face_height = (forehead.y - chin.y).abs();

        if !gaze.is_finite() || !tilt.is_finite() || !face_height.is_finite() {
            return Err(FrameRejection::NonFinite);
        }

        Ok(SignalReading::new(gaze, tilt, face_height))
    }
}

#[cfg(test)]
pub(crate) mod test_faces {
    use crate::collector::types::{landmark_index as idx, Landmark, LandmarkFrame};

    /// A symmetric, camera-facing refined mesh.
    ///
    /// `nose_dx` shifts the nose tip horizontally, `iris_dx` shifts both
    /// iris centers horizontally.
    pub fn face(nose_dx: f64, iris_dx: f64) -> LandmarkFrame {
        let mut points = vec![Landmark::new(0.5, 0.5); idx::REFINED_MESH_LEN];
        points[idx::NOSE_TIP] = Landmark::new(0.5 + nose_dx, 0.48);
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
}

#[cfg(test)]
mod tests {
    use super::test_faces::face;
    use super::*;

    #[test]
    fn test_neutral_face() {
        let processor = SignalProcessor::default();
        let reading = processor.measure(&face(0.0, 0.0)).unwrap();

        assert!(reading.gaze.x.abs() < 1e-9);
        // Nose sits 0.08 below the eye line, weighted by the vertical head weight
        assert!((reading.gaze.y - 0.056).abs() < 1e-9);
        assert!(reading.tilt < 1e-9);
        assert!((reading.face_height - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_iris_shift_dominates_horizontal_gaze() {
        let processor = SignalProcessor::default();
        // 0.012 iris shift on a 0.06 wide eye is a 0.2 normalized offset
        let reading = processor.measure(&face(0.0, 0.012)).unwrap();
        assert!((reading.gaze.x - 0.6 * 0.2).abs() < 1e-9);
        assert!(reading.tilt < 1e-9);
    }

    #[test]
    fn test_head_turn_raises_tilt() {
        let processor = SignalProcessor::default();
        let reading = processor.measure(&face(0.03, 0.0)).unwrap();
        assert!((reading.gaze.x - 0.4 * 0.03).abs() < 1e-9);
        assert!((reading.tilt - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_without_iris_uses_head_pose() {
        let processor = SignalProcessor::default();
        let mut frame = face(0.01, 0.0);
        frame.points.truncate(idx::BASE_MESH_LEN);

        let reading = processor.measure(&frame).unwrap();
        assert!((reading.gaze.x - 0.01).abs() < 1e-9);
        assert!((reading.gaze.y - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_implausible_eye_width_rejected() {
        let processor = SignalProcessor::default();
        let mut frame = face(0.0, 0.0);
        frame.points[idx::LEFT_EYE_INNER] = Landmark::new(0.405, 0.40);

        assert!(matches!(
            processor.measure(&frame),
            Err(FrameRejection::EyeWidthOutOfRange { .. })
        ));
    }

    #[test]
    fn test_missing_and_non_finite_landmarks() {
        let processor = SignalProcessor::default();

        let short = LandmarkFrame::new(vec![Landmark::new(0.5, 0.5); 5]);
        assert!(matches!(
            processor.measure(&short),
            Err(FrameRejection::MissingLandmark(_))
        ));

        let mut frame = face(0.0, 0.0);
        frame.points[idx::NOSE_TIP] = Landmark::new(f64::NAN, 0.5);
        assert_eq!(processor.measure(&frame), Err(FrameRejection::NonFinite));
    }

    #[test]
    fn test_good_range() {
        let config = SignalConfig::default();
        assert!(config.in_good_range(0.5));
        assert!(!config.in_good_range(0.1));
        assert!(!config.in_good_range(0.8));
    }
}
