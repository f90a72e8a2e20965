//! Audit counters for everything the agent touched.
//!
//! The log holds counts only. Frames, landmarks and identities never
//! reach it, so it can be persisted and shown to the user as is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A quantity tracked by the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    /// Landmark frames handed to an engine
    FramesProcessed,
    /// Frames in which a face was present
    FacesDetected,
    /// Frames the engine could not measure
    FramesRejected,
    /// Per-interval samples kept by session recorders
    SamplesRecorded,
    ReportsExported,
    /// Server sessions dropped after going idle
    SessionsEvicted,
}

impl Counter {
    pub const ALL: [Counter; 6] = [
        Counter::FramesProcessed,
        Counter::FacesDetected,
        Counter::FramesRejected,
        Counter::SamplesRecorded,
        Counter::ReportsExported,
        Counter::SessionsEvicted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Counter::FramesProcessed => "Frames processed",
            Counter::FacesDetected => "Frames with a face",
            Counter::FramesRejected => "Frames rejected",
            Counter::SamplesRecorded => "Samples recorded",
            Counter::ReportsExported => "Reports exported",
            Counter::SessionsEvicted => "Idle sessions evicted",
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub frames_processed: u64,
    pub faces_detected: u64,
    pub frames_rejected: u64,
    pub samples_recorded: u64,
    pub reports_exported: u64,
    pub sessions_evicted: u64,
}

impl Counts {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::FramesProcessed => self.frames_processed,
            Counter::FacesDetected => self.faces_detected,
            Counter::FramesRejected => self.frames_rejected,
            Counter::SamplesRecorded => self.samples_recorded,
            Counter::ReportsExported => self.reports_exported,
            Counter::SessionsEvicted => self.sessions_evicted,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::FramesProcessed => &mut self.frames_processed,
            Counter::FacesDetected => &mut self.faces_detected,
            Counter::FramesRejected => &mut self.frames_rejected,
            Counter::SamplesRecorded => &mut self.samples_recorded,
            Counter::ReportsExported => &mut self.reports_exported,
            Counter::SessionsEvicted => &mut self.sessions_evicted,
        }
    }

    /// Share of processed frames that contained a face.
    pub fn face_rate(&self) -> Option<f64> {
        (self.frames_processed > 0)
            .then(|| self.faces_detected as f64 / self.frames_processed as f64)
    }
}

/// Snapshot of the log for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    #[serde(flatten)]
    pub counts: Counts,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCounts {
    #[serde(flatten)]
    counts: Counts,
    last_updated: DateTime<Utc>,
}

/// Lock-free counters shared by the collector loop and server handlers.
#[derive(Debug)]
pub struct TransparencyLog {
    counters: [AtomicU64; Counter::ALL.len()],
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that resumes from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let log = Self {
            persist_path: Some(path),
            ..Self::new()
        };

        if let Some(path) = &log.persist_path {
            match read_counts(path) {
                Ok(Some(counts)) => log.restore(&counts),
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not load previous transparency stats: {e}"),
            }
        }

        log
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Count one processed frame.
    pub fn record_frame(&self, face_detected: bool) {
        self.increment(Counter::FramesProcessed);
        if face_detected {
            self.increment(Counter::FacesDetected);
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for counter in Counter::ALL {
            *counts.slot(counter) = self.get(counter);
        }
        counts
    }

    fn restore(&self, counts: &Counts) {
        for counter in Counter::ALL {
            self.counters[counter as usize].store(counts.get(counter), Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            counts: self.counts(),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable counters followed by the privacy guarantee.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let mut out = String::from("Session Statistics:\n");
        for counter in Counter::ALL {
            out.push_str(&format!(
                " - {}: {}\n",
                counter.label(),
                stats.counts.get(counter)
            ));
        }
        if let Some(rate) = stats.counts.face_rate() {
            out.push_str(&format!(" - Face in view: {:.0}%\n", rate * 100.0));
        }
        out.push_str(&format!(" - Uptime: {} seconds\n", stats.uptime_secs));
        out.push_str(
            "\nPrivacy Guarantee:\n \
             - No video frames or images stored\n \
             - Landmarks are discarded after scoring\n \
             - Only focus scores and gaze directions retained",
        );
        out
    }

    /// Write the counters to the persistence path, if any.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedCounts {
            counts: self.counts(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read counters saved by [`TransparencyLog::save`]; `None` if nothing
/// was saved yet.
pub fn read_counts(path: &Path) -> Result<Option<Counts>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let persisted: PersistedCounts =
        serde_json::from_str(&content).map_err(std::io::Error::other)?;
    Ok(Some(persisted.counts))
}

pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
