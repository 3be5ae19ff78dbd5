//! Configuration management for record-webcam
//!
//! Covers download naming, capture constraints, recorder options and
//! session timing. Loads from TOML, optionally layered with environment
//! overrides (`RECORD_WEBCAM__SECTION__KEY`).

use crate::codec;
use crate::errors::RecordError;
use crate::recording::RecorderOptions;
use crate::types::MediaTrackConstraints;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordWebcamConfig {
    pub options: FileOptions,
    pub constraints: CaptureConstraints,
    pub recorder: RecorderConfig,
    pub session: SessionConfig,
}

/// Download naming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Base name for downloads; the creation timestamp in ms when unset
    pub file_name: Option<String>,
    /// Container extension, also used to derive the default mime type
    pub file_type: String,
}

/// Track constraints applied when a camera is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<f64>,
    pub frame_rate: Option<f64>,
    pub echo_cancellation: Option<bool>,
}

/// Chunked recorder options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Overrides the mime type derived from `options.file_type`
    pub mime_type: Option<String>,
    pub audio_bits_per_second: u32,
    pub video_bits_per_second: u32,
    /// Deliver chunks every N ms instead of only at stop
    pub time_slice_ms: Option<u64>,
}

/// Session lifecycle timing and facade limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Auto-stop a recording after this many seconds
    pub recording_length_secs: Option<f64>,
    /// Hardware settle delay after a camera opens
    pub settle_delay_ms: u64,
    /// Upper bound on waiting for a recorder confirmation
    pub confirm_timeout_ms: u64,
    /// Maximum concurrent snapshot subscribers
    pub max_subscribers: usize,
    /// Log every recorded failure at error level
    pub dev_mode: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            file_name: None,
            file_type: "webm".to_string(),
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: Some(1280),
            height: Some(720),
            aspect_ratio: Some(1.7),
            frame_rate: None,
            echo_cancellation: Some(true),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mime_type: None,
            audio_bits_per_second: 128_000,
            video_bits_per_second: 2_500_000,
            time_slice_ms: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_length_secs: None,
            settle_delay_ms: 1700,
            confirm_timeout_ms: 5000,
            max_subscribers: 16,
            dev_mode: false,
        }
    }
}

impl From<&CaptureConstraints> for MediaTrackConstraints {
    fn from(c: &CaptureConstraints) -> Self {
        MediaTrackConstraints {
            width: c.width,
            height: c.height,
            aspect_ratio: c.aspect_ratio,
            frame_rate: c.frame_rate,
            echo_cancellation: c.echo_cancellation,
        }
    }
}

impl RecordWebcamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| RecordError::Config(format!("Failed to read config file: {}", e)))?;

        let config: RecordWebcamConfig = toml::from_str(&contents)
            .map_err(|e| RecordError::Config(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load defaults, then the TOML file if present, then environment overrides.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let defaults = ::config::Config::try_from(&Self::default())
            .map_err(|e| RecordError::Config(format!("Failed to seed defaults: {}", e)))?;

        let settings = ::config::Config::builder()
            .add_source(defaults)
            .add_source(
                ::config::File::new(&path.to_string_lossy(), ::config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix("RECORD_WEBCAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RecordError::Config(format!("Failed to build config: {}", e)))?;

        let config: RecordWebcamConfig = settings
            .try_deserialize()
            .map_err(|e| RecordError::Config(format!("Failed to deserialize config: {}", e)))?;

        config.validate().map_err(RecordError::Config)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    RecordError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RecordError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| RecordError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("record-webcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_layered(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.options.file_type.trim().is_empty() {
            return Err("File type must not be empty".to_string());
        }
        if let Some(name) = &self.options.file_name {
            if name.trim().is_empty() || name.contains(['/', '\\']) {
                return Err("File name must be a non-empty base name".to_string());
            }
        }

        let c = &self.constraints;
        if c.width == Some(0) || c.height == Some(0) {
            return Err("Invalid capture resolution".to_string());
        }
        if let Some(ratio) = c.aspect_ratio {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err("Aspect ratio must be positive".to_string());
            }
        }
        if let Some(fps) = c.frame_rate {
            if !(fps > 0.0 && fps <= 240.0) {
                return Err("Invalid frame rate (must be 1-240)".to_string());
            }
        }

        if self.recorder.time_slice_ms == Some(0) {
            return Err("Time slice must be at least 1 ms".to_string());
        }

        if let Some(secs) = self.session.recording_length_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err("Recording length must be positive".to_string());
            }
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(format!("Recording length {} s is out of range", secs));
            }
        }
        if self.session.confirm_timeout_ms == 0 {
            return Err("Confirm timeout must be at least 1 ms".to_string());
        }
        if self.session.max_subscribers == 0 {
            return Err("At least one subscriber must be allowed".to_string());
        }

        Ok(())
    }

    /// Recording mime type after applying the override
    pub fn mime_type(&self) -> String {
        codec::resolve_mime_type(self.recorder.mime_type.as_deref(), &self.options.file_type)
    }

    pub fn track_constraints(&self) -> MediaTrackConstraints {
        MediaTrackConstraints::from(&self.constraints)
    }

    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            mime_type: self.mime_type(),
            audio_bits_per_second: self.recorder.audio_bits_per_second,
            video_bits_per_second: self.recorder.video_bits_per_second,
        }
    }

    pub fn time_slice(&self) -> Option<Duration> {
        self.recorder.time_slice_ms.map(Duration::from_millis)
    }

    pub fn recording_length(&self) -> Option<Duration> {
        self.session
            .recording_length_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.session.settle_delay_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.session.confirm_timeout_ms)
    }
}
