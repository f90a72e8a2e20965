//! Per-session recording of focus samples.
//!
//! The engine emits one sample per video frame. The recorder keeps the
//! first sample of each sampling interval (one per second by default),
//! tracks distraction runs and aggregates everything into a
//! [`SessionSummary`] when the session ends.

use crate::core::sample::{DistractionType, FocusSample, GazeDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Whether a face was visible for a recorded second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStatus {
    Detected,
    NotDetected,
}

/// One recorded sampling interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusDetail {
    /// Seconds since session start
    pub second: u64,
    pub score: u8,
    pub gaze_direction: GazeDirection,
    pub face_status: FaceStatus,
}

/// A run of consecutive intervals with the same distraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistractionEvent {
    /// Seconds since session start at which the run began
    pub second: u64,
    pub kind: DistractionType,
    pub duration_secs: u64,
}

/// Aggregate statistics of a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
    /// Seconds during which a face was detected
    pub effective_duration_secs: u64,
    /// Mean score over all recorded intervals
    pub average_score: f64,
    /// Seconds spent distracted
    pub distraction_count: u64,
    pub distraction_breakdown: BTreeMap<DistractionType, u64>,
    pub direction_breakdown: BTreeMap<GazeDirection, u64>,
    /// Share of recorded intervals with a face and no distraction label
    pub focused_ratio: f64,
}

/// Downsamples engine output into a session record.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    session_id: String,
    started_at: DateTime<Utc>,
    interval_secs: u64,
    details: Vec<FocusDetail>,
    distractions: Vec<DistractionEvent>,
    last_bucket: Option<u64>,
}

impl SessionRecorder {
    /// Create a recorder; intervals shorter than one second are rounded up.
    pub fn new(session_id: impl Into<String>, started_at: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            session_id: session_id.into(),
            started_at,
            interval_secs: interval.as_secs().max(1),
            details: Vec::new(),
            distractions: Vec::new(),
            last_bucket: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn details(&self) -> &[FocusDetail] {
        &self.details
    }

    pub fn distractions(&self) -> &[DistractionEvent] {
        &self.distractions
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Record a sample observed at `timestamp`.
    ///
    /// Returns `true` if the sample opened a new interval and was kept.
    /// Samples in an interval that was already recorded, or older than
    /// the last recorded one, are dropped.
    pub fn record(&mut self, timestamp: DateTime<Utc>, sample: &FocusSample) -> bool {
        let elapsed_ms = (timestamp - self.started_at).num_milliseconds().max(0) as u64;
        let bucket = elapsed_ms / 1000 / self.interval_secs;

        if matches!(self.last_bucket, Some(last) if bucket <= last) {
            return false;
        }
        self.last_bucket = Some(bucket);

        let second = bucket * self.interval_secs;
        let detected = sample.is_face_detected;

        self.details.push(FocusDetail {
            second,
            score: if detected { sample.focus_score } else { 0 },
            gaze_direction: if detected {
                sample.gaze_direction
            } else {
                GazeDirection::Unknown
            },
            face_status: if detected {
                FaceStatus::Detected
            } else {
                FaceStatus::NotDetected
            },
        });

        let kind = match (detected, sample.distraction_type) {
            (_, Some(kind)) => Some(kind),
            (false, None) => Some(DistractionType::FaceNotDetected),
            (true, None) => None,
        };
        if let Some(kind) = kind {
            self.push_distraction(second, kind);
        }

        true
    }

    fn push_distraction(&mut self, second: u64, kind: DistractionType) {
        if let Some(last) = self.distractions.last_mut() {
            if last.kind == kind && last.second + last.duration_secs == second {
                last.duration_secs += self.interval_secs;
                return;
            }
        }
        self.distractions.push(DistractionEvent {
            second,
            kind,
            duration_secs: self.interval_secs,
        });
    }

    /// Aggregate the recorded intervals.
    pub fn summary(&self, ended_at: DateTime<Utc>) -> SessionSummary {
        let recorded = self.details.len() as u64;
        let detected = self
            .details
            .iter()
            .filter(|d| d.face_status == FaceStatus::Detected)
            .count() as u64;

        let average_score = if self.details.is_empty() {
            0.0
        } else {
            let total: u64 = self.details.iter().map(|d| u64::from(d.score)).sum();
            total as f64 / recorded as f64
        };

        let mut distraction_breakdown = BTreeMap::new();
        for event in &self.distractions {
            *distraction_breakdown.entry(event.kind).or_insert(0) += event.duration_secs;
        }
        let distraction_count = distraction_breakdown.values().sum::<u64>();

        let mut direction_breakdown = BTreeMap::new();
        for detail in &self.details {
            *direction_breakdown.entry(detail.gaze_direction).or_insert(0) += 1;
        }

        let distracted_intervals = distraction_count / self.interval_secs;
        let focused_ratio = if recorded == 0 {
            0.0
        } else {
            recorded.saturating_sub(distracted_intervals) as f64 / recorded as f64
        };

        SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at,
            duration_secs: (ended_at - self.started_at).num_seconds().max(0) as u64,
            effective_duration_secs: detected * self.interval_secs,
            average_score,
            distraction_count,
            distraction_breakdown,
            direction_breakdown,
            focused_ratio,
        }
    }
}
