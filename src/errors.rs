//! Error taxonomy for the recording core
//!
//! `RecordError` is what registry operations return. `PlatformError` is what
//! the platform adapters report; it is translated into a `RecordError` at the
//! adapter boundary so the registry never matches on platform details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Status;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Recording session already exists: {0}")]
    DuplicateSession(String),

    #[error("No recording by id found: {0}")]
    NotFound(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Codec not supported: {0}")]
    CodecNotSupported(String),

    #[error("Stop recording error: {0}")]
    StopRecording(String),

    #[error("Cannot {operation} while {status}")]
    InvalidState { operation: &'static str, status: Status },

    #[error("Recording {0} has no finalized artifact")]
    NoArtifact(String),

    #[error("Timed out waiting for recorder to confirm {0}")]
    Timeout(&'static str),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Subscriber limit reached ({0})")]
    SubscriberLimit(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecordError {
    /// Stable machine-readable code, suitable for a UI error slot.
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::PermissionDenied(_) => "NO_USER_PERMISSION",
            RecordError::DuplicateSession(_) => "SESSION_EXISTS",
            RecordError::NotFound(_) => "NO_RECORDING_WITH_ID",
            RecordError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            RecordError::CodecNotSupported(_) => "CODEC_NOT_SUPPORTED",
            RecordError::StopRecording(_) => "STOP_RECORDING_ERROR",
            RecordError::InvalidState { .. } => "INVALID_STATE",
            RecordError::NoArtifact(_) => "NO_ARTIFACT",
            RecordError::Timeout(_) => "TIMEOUT",
            RecordError::Recorder(_) => "RECORDER_ERROR",
            RecordError::SubscriberLimit(_) => "SUBSCRIBER_LIMIT",
            RecordError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn invalid_state(operation: &'static str, status: Status) -> Self {
        RecordError::InvalidState { operation, status }
    }
}

/// Failure reported by a platform adapter.
///
/// Variant names follow the DOMException names a browser raises from
/// `getUserMedia` and `MediaRecorder`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("device not readable: {0}")]
    NotReadable(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Translate a failure raised while opening a capture stream.
    pub fn into_stream_error(self) -> RecordError {
        match self {
            PlatformError::NotAllowed(msg) => RecordError::PermissionDenied(msg),
            PlatformError::NotFound(msg) | PlatformError::NotReadable(msg) => {
                RecordError::DeviceUnavailable(msg)
            }
            other => RecordError::DeviceUnavailable(other.to_string()),
        }
    }

    /// Translate a failure raised by the chunked recorder.
    pub fn into_recorder_error(self) -> RecordError {
        match self {
            PlatformError::NotSupported(msg) => RecordError::CodecNotSupported(msg),
            other => RecordError::Recorder(other.to_string()),
        }
    }
}

/// Structured record of the most recent failure, kept in the registry's
/// error slot until the host clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub function_name: String,
    pub session_id: Option<String>,
    pub code: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorContext {
    pub fn new(function_name: &str, session_id: Option<&str>, error: &RecordError) -> Self {
        Self {
            function_name: function_name.to_string(),
            session_id: session_id.map(str::to_string),
            code: error.code().to_string(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RecordError::DuplicateSession("a-b".into()).code(), "SESSION_EXISTS");
        assert_eq!(RecordError::NotFound("a-b".into()).code(), "NO_RECORDING_WITH_ID");
        assert_eq!(RecordError::PermissionDenied("x".into()).code(), "NO_USER_PERMISSION");
        assert_eq!(
            RecordError::CodecNotSupported("x".into()).code(),
            "CODEC_NOT_SUPPORTED"
        );
    }

    #[test]
    fn test_invalid_state_display() {
        let err = RecordError::invalid_state("pause", Status::Open);
        assert_eq!(err.to_string(), "Cannot pause while OPEN");
    }

    #[test]
    fn test_platform_error_translation() {
        assert!(matches!(
            PlatformError::NotReadable("busy".into()).into_stream_error(),
            RecordError::DeviceUnavailable(_)
        ));
        assert!(matches!(
            PlatformError::NotAllowed("denied".into()).into_stream_error(),
            RecordError::PermissionDenied(_)
        ));
        assert!(matches!(
            PlatformError::NotSupported("codec".into()).into_recorder_error(),
            RecordError::CodecNotSupported(_)
        ));
        assert!(matches!(
            PlatformError::InvalidState("inactive".into()).into_recorder_error(),
            RecordError::Recorder(_)
        ));
    }

    #[test]
    fn test_error_context_serializes_camel_case() {
        let ctx = ErrorContext::new("startRecording", Some("cam1-mic1"), &RecordError::Timeout("start"));
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("functionName"));
        assert!(json.contains("cam1-mic1"));
        assert!(json.contains("TIMEOUT"));
    }
}
