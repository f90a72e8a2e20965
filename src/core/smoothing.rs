//! Temporal smoothing of gaze vectors and focus scores.
//!
//! Landmark jitter is suppressed with an outlier-rejecting moving average
//! per gaze axis; the score history is smoothed with a linearly
//! recency-weighted average so the displayed number does not flicker.

use crate::core::signal::GazeVector;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::collections::VecDeque;

/// Tunables for both smoothing filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Samples kept per gaze axis
    pub gaze_history: usize,
    /// Maximum distance from the axis median for a sample to be averaged in
    pub outlier_tolerance: f64,
    /// Raw scores kept for the weighted average
    pub score_history: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            gaze_history: 10,
            outlier_tolerance: 0.1,
            score_history: 8,
        }
    }
}

/// Median of a slice; 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values.to_vec()).median()
}

/// FIFO buffer that evicts its oldest value once full.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Outlier-rejecting moving average over gaze vectors.
#[derive(Debug, Clone)]
pub struct GazeSmoother {
    x: BoundedHistory,
    y: BoundedHistory,
    tolerance: f64,
}

impl GazeSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            x: BoundedHistory::new(config.gaze_history),
            y: BoundedHistory::new(config.gaze_history),
            tolerance: config.outlier_tolerance,
        }
    }

    /// Add a sample and return the smoothed gaze.
    pub fn push(&mut self, gaze: GazeVector) -> GazeVector {
        self.x.push(gaze.x);
        self.y.push(gaze.y);
        GazeVector::new(
            robust_mean(&self.x.to_vec(), self.tolerance),
            robust_mean(&self.y.to_vec(), self.tolerance),
        )
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Mean of the samples within `tolerance` of the median, or the median
/// itself if every sample is an outlier.
fn robust_mean(values: &[f64], tolerance: f64) -> f64 {
    let m = median(values);
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| (v - m).abs() <= tolerance)
        .collect();

    if kept.is_empty() {
        m
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    }
}

/// Recency-weighted average over raw focus scores.
#[derive(Debug, Clone)]
pub struct ScoreSmoother {
    history: BoundedHistory,
}

impl ScoreSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            history: BoundedHistory::new(config.score_history),
        }
    }

    /// Add a raw score and return the smoothed integer score.
    pub fn push(&mut self, score: f64) -> u8 {
        self.history.push(score.clamp(0.0, 100.0));

        let (weighted, total) = self
            .history
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, weights), (i, s)| {
                let w = (i + 1) as f64;
                (sum + s * w, weights + w)
            });

        (weighted / total).round().clamp(0.0, 100.0) as u8
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
