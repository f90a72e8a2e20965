//! Exportable session report.
//!
//! A report bundles the session summary with the per-second details and
//! distraction runs, tagged with producer metadata and local start time.

use crate::core::session::{DistractionEvent, FocusDetail, SessionRecorder, SessionSummary};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "focus-sensor-agent";

/// Producer metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
    /// Host-derived device identifier
    pub device_id: String,
}

/// Privacy declaration carried by every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPrivacy {
    /// Always false: reports hold no names, images or landmarks
    pub contains_pii: bool,
    /// Always false: video frames are never stored
    pub stores_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Default for ReportPrivacy {
    fn default() -> Self {
        Self {
            contains_pii: false,
            stores_images: false,
            notes: Some(
                "Only landmark-derived focus scores and gaze directions are recorded".to_string(),
            ),
        }
    }
}

/// A complete session export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// IANA timezone of the local times below
    pub timezone: String,
    /// Session start in the report timezone (RFC3339)
    pub started_at_local: String,
    /// Session end in the report timezone (RFC3339)
    pub ended_at_local: String,
    pub summary: SessionSummary,
    pub details: Vec<FocusDetail>,
    pub distractions: Vec<DistractionEvent>,
    pub privacy: ReportPrivacy,
}

/// Builder for session reports.
pub struct ReportBuilder {
    instance_id: Uuid,
    device_id: String,
    timezone: Tz,
}

impl ReportBuilder {
    /// Create a builder with a fresh instance ID, reporting in UTC.
    pub fn new() -> Self {
        let instance_id = Uuid::new_v4();
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let device_id = format!("focus-{}-{}", hostname, &instance_id.to_string()[..8]);

        Self {
            instance_id,
            device_id,
            timezone: Tz::UTC,
        }
    }

    /// Report local times in `timezone`.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Build a report for a session ending at `ended_at`.
    pub fn build(&self, recorder: &SessionRecorder, ended_at: DateTime<Utc>) -> SessionReport {
        let summary = recorder.summary(ended_at);

        SessionReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id.to_string(),
                device_id: self.device_id.clone(),
            },
            timezone: self.timezone.name().to_string(),
            started_at_local: summary
                .started_at
                .with_timezone(&self.timezone)
                .to_rfc3339(),
            ended_at_local: ended_at.with_timezone(&self.timezone).to_rfc3339(),
            summary,
            details: recorder.details().to_vec(),
            distractions: recorder.distractions().to_vec(),
            privacy: ReportPrivacy::default(),
        }
    }

    /// Build and serialize a report to JSON.
    pub fn build_json(&self, recorder: &SessionRecorder, ended_at: DateTime<Utc>) -> String {
        let report = self.build(recorder, ended_at);
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
