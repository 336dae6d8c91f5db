use crate::data_structures::{FacingMode, StreamConstraints};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Venues offered by the admin UI's event selector.
pub const DEFAULT_VENUES: [&str; 5] = [
    "BIL Workshop Room",
    "BIL Amphitheatre",
    "Executive Boardroom",
    "Yayasan An-Naura Hall",
    "Innovation Lab",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KioskConfig {
    // Remote service
    pub backend_base_url: String,
    pub venue: String,
    pub extra_headers: Vec<(String, String)>, // Sent with every request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    // Camera
    pub stream_ideal_width: u32,
    pub stream_ideal_height: u32,
    pub jpeg_quality: f32,

    // Liveness sequencing
    pub countdown_from: u32,
    #[serde(with = "humantime_serde")]
    pub countdown_tick: Duration,
    #[serde(with = "humantime_serde")]
    pub blink_settle: Duration, // Pause after the blink prompt before frame 1
    #[serde(with = "humantime_serde")]
    pub blink_window: Duration, // Gap between frame 1 and frame 2

    // Check-in presentation
    #[serde(with = "humantime_serde")]
    pub result_display: Duration,
    #[serde(with = "humantime_serde")]
    pub scan_interval: Duration,

    // Logging filter directive handed to the subscriber by the binary
    pub log_filter: String,
}

impl Default for KioskConfig {
    fn default() -> Self {
        KioskConfig {
            backend_base_url: "http://localhost:5000".to_string(),
            venue: DEFAULT_VENUES[0].to_string(),
            extra_headers: vec![(
                "ngrok-skip-browser-warning".to_string(),
                "true".to_string(),
            )],
            request_timeout: Duration::from_secs(15),

            stream_ideal_width: 640,
            stream_ideal_height: 640,
            jpeg_quality: 0.8,

            countdown_from: 3,
            countdown_tick: Duration::from_secs(1),
            blink_settle: Duration::from_millis(500),
            blink_window: Duration::from_millis(1000),

            result_display: Duration::from_secs(4),
            scan_interval: Duration::from_millis(3500),

            log_filter: "info".to_string(),
        }
    }
}

impl KioskConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: KioskConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend_base_url is empty".into()));
        }
        if self.countdown_from == 0 {
            return Err(ConfigError::Invalid("countdown_from must be at least 1".into()));
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be in (0, 1], got {}",
                self.jpeg_quality
            )));
        }
        if self.stream_ideal_width == 0 || self.stream_ideal_height == 0 {
            return Err(ConfigError::Invalid("stream resolution must be non-zero".into()));
        }
        let timers = [
            ("countdown_tick", self.countdown_tick),
            ("blink_settle", self.blink_settle),
            ("blink_window", self.blink_window),
            ("result_display", self.result_display),
            ("scan_interval", self.scan_interval),
            ("request_timeout", self.request_timeout),
        ];
        for (name, value) in timers {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }

    pub fn stream_constraints(&self) -> StreamConstraints {
        StreamConstraints {
            facing: FacingMode::User,
            ideal_width: self.stream_ideal_width,
            ideal_height: self.stream_ideal_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KioskConfig::default();
        assert_eq!(config.countdown_from, 3);
        assert_eq!(config.countdown_tick, Duration::from_secs(1));
        assert_eq!(config.blink_settle, Duration::from_millis(500));
        assert_eq!(config.blink_window, Duration::from_millis(1000));
        assert_eq!(config.result_display, Duration::from_secs(4));
        assert_eq!(config.scan_interval, Duration::from_millis(3500));
        assert_eq!(config.stream_ideal_width, 640);
        assert_eq!(config.venue, "BIL Workshop Room");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = KioskConfig::from_json_str(
            r#"{ "venue": "Innovation Lab", "scan_interval": "2s", "blink_window": "750ms" }"#,
        )
        .unwrap();
        assert_eq!(config.venue, "Innovation Lab");
        assert_eq!(config.scan_interval, Duration::from_secs(2));
        assert_eq!(config.blink_window, Duration::from_millis(750));
        assert_eq!(config.result_display, Duration::from_secs(4));
    }

    #[test]
    fn rejects_zero_countdown_and_bad_quality() {
        let err = KioskConfig::from_json_str(r#"{ "countdown_from": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = KioskConfig::from_json_str(r#"{ "jpeg_quality": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = KioskConfig::from_json_str(r#"{ "scan_interval": "0s" }"#).unwrap_err();
        assert!(err.to_string().contains("scan_interval"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = KioskConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = KioskConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with("here.json")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
