//! Shared value types: statuses, device descriptors, constraints, surfaces.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blob::ObjectUrl;

/// Lifecycle status of one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Initial,
    Open,
    Recording,
    Paused,
    Stopped,
    Closed,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Initial => "INITIAL",
            Status::Open => "OPEN",
            Status::Recording => "RECORDING",
            Status::Paused => "PAUSED",
            Status::Stopped => "STOPPED",
            Status::Closed => "CLOSED",
            Status::Error => "ERROR",
        }
    }

    /// True while a recorder handle is owned by the session.
    pub fn is_capturing(&self) -> bool {
        matches!(self, Status::Recording | Status::Paused)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Initial
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind reported by device enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

/// One entry of the platform's media device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
    #[serde(default)]
    pub group_id: String,
}

impl MediaDeviceInfo {
    pub fn new(device_id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            label: label.into(),
            group_id: String::new(),
        }
    }

    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(device_id, DeviceKind::VideoInput, label)
    }

    pub fn audio(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(device_id, DeviceKind::AudioInput, label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Track-level capture constraints. `None` leaves the platform default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTrackConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<f64>,
    pub frame_rate: Option<f64>,
    pub echo_cancellation: Option<bool>,
}

impl MediaTrackConstraints {
    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merged_with(&self, other: &MediaTrackConstraints) -> MediaTrackConstraints {
        MediaTrackConstraints {
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            aspect_ratio: other.aspect_ratio.or(self.aspect_ratio),
            frame_rate: other.frame_rate.or(self.frame_rate),
            echo_cancellation: other.echo_cancellation.or(self.echo_cancellation),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == MediaTrackConstraints::default()
    }
}

/// Which device a stream request wants for one track kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackRequest {
    Disabled,
    Any,
    Exact(String),
}

/// Argument to `MediaDevices::get_user_media`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamRequest {
    pub video: TrackRequest,
    pub audio: TrackRequest,
}

impl MediaStreamRequest {
    /// Combined audio+video request used only to trigger the permission prompt.
    pub fn any() -> Self {
        Self {
            video: TrackRequest::Any,
            audio: TrackRequest::Any,
        }
    }

    /// Request scoped to exact device ids.
    pub fn exact(video_id: &str, audio_id: &str) -> Self {
        Self {
            video: TrackRequest::Exact(video_id.to_string()),
            audio: TrackRequest::Exact(audio_id.to_string()),
        }
    }
}

/// What a display surface is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SurfaceSource {
    /// A live capture stream, by stream id.
    Stream(String),
    /// A finalized recording, by object URL.
    Url(ObjectUrl),
}

/// Opaque stand-in for a UI video element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub source: Option<SurfaceSource>,
}

impl Surface {
    pub fn attach(&mut self, source: SurfaceSource) {
        self.source = Some(source);
    }

    pub fn detach(&mut self) {
        self.source = None;
    }

    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&Status::Recording).unwrap();
        assert_eq!(json, "\"RECORDING\"");
        assert_eq!(Status::Paused.to_string(), "PAUSED");
    }

    #[test]
    fn test_constraints_overlay() {
        let base = MediaTrackConstraints {
            width: Some(1280),
            height: Some(720),
            aspect_ratio: Some(1.7),
            ..Default::default()
        };
        let overlay = MediaTrackConstraints {
            width: Some(1920),
            frame_rate: Some(30.0),
            ..Default::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.width, Some(1920));
        assert_eq!(merged.height, Some(720));
        assert_eq!(merged.frame_rate, Some(30.0));
        assert_eq!(merged.aspect_ratio, Some(1.7));
    }

    #[test]
    fn test_device_kind_wire_names() {
        let device = MediaDeviceInfo::video("cam1", "Front Camera");
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"videoinput\""));
        assert!(json.contains("deviceId"));
    }
}
