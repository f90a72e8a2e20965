//! Configuration for the Focus Sensor Agent.

use crate::core::calibration::CalibrationConfig;
use crate::core::classifier::ClassifierConfig;
use crate::core::signal::SignalConfig;
use crate::core::smoothing::SmoothingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the sensor agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scoring engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// How often a focus sample is kept for the session record
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,

    /// Path for exporting session reports
    pub export_path: PathBuf,

    /// Path for storing state and transparency logs
    pub data_path: PathBuf,

    /// IANA timezone used for local times in reports
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focus-sensor-agent");

        Self {
            engine: EngineConfig::default(),
            sample_interval: Duration::from_secs(1),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when it does not exist.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("focus-sensor-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Parsed report timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Check the whole configuration for inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sample_interval must be at least one second".to_string(),
            ));
        }
        self.tz()?;
        self.engine.validate()
    }
}

/// Tunables of the scoring engine, grouped by stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calibration: CalibrationConfig,
    pub signal: SignalConfig,
    pub smoothing: SmoothingConfig,
    pub classifier: ClassifierConfig,
}

impl EngineConfig {
    /// Check that thresholds are ordered and buffers are non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.calibration.frames == 0 {
            return invalid("calibration.frames must be positive");
        }
        if self.smoothing.gaze_history == 0 || self.smoothing.score_history == 0 {
            return invalid("smoothing histories must hold at least one sample");
        }
        if self.smoothing.outlier_tolerance <= 0.0 {
            return invalid("smoothing.outlier_tolerance must be positive");
        }

        let s = &self.signal;
        if !(0.0 < s.min_eye_width && s.min_eye_width < s.max_eye_width) {
            return invalid("signal eye width range is empty");
        }
        if !(0.0..=1.0).contains(&s.head_weight_x) || !(0.0..=1.0).contains(&s.head_weight_y) {
            return invalid("signal head weights must lie in [0, 1]");
        }

        let c = &self.classifier;
        if !(c.horizontal_threshold < c.moderate_horizontal_threshold
            && c.moderate_horizontal_threshold < c.extreme_horizontal_threshold)
        {
            return invalid("horizontal thresholds must increase: center < moderate < extreme");
        }
        if c.vertical_threshold >= c.phone_threshold {
            return invalid("vertical_threshold must be below phone_threshold");
        }
        if c.tilt_threshold <= 0.0 {
            return invalid("tilt_threshold must be positive");
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
