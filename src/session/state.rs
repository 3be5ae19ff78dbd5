//! Session snapshots

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::blob::{Blob, ObjectUrl};
use crate::devices::DeviceRef;
use crate::recording::RecordingStats;
use crate::types::{Status, Surface};

/// Immutable view of one recording session.
///
/// The registry never mutates a published snapshot; every transition
/// replaces it, so a snapshot held by a caller stays as it was.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub video_device_id: String,
    pub audio_device_id: String,
    pub video_label: String,
    pub audio_label: String,
    pub status: Status,
    pub mime_type: String,
    pub file_name: String,
    pub file_type: String,
    pub is_muted: bool,
    /// Chunks buffered by the current take
    pub pending_chunks: usize,
    pub pending_bytes: usize,
    /// A recorder is still attached, possibly after a failed step
    pub has_recorder: bool,
    #[serde(skip)]
    pub finalized_blob: Option<Blob>,
    #[serde(rename = "objectURL")]
    pub object_url: Option<ObjectUrl>,
    pub webcam: Surface,
    pub preview: Surface,
    pub stats: Option<RecordingStats>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// `<video>-<audio>`
    pub fn composite_id(video_device_id: &str, audio_device_id: &str) -> String {
        format!("{}-{}", video_device_id, audio_device_id)
    }

    pub(crate) fn new(
        video: &DeviceRef,
        audio: &DeviceRef,
        file_name: String,
        file_type: String,
        mime_type: String,
    ) -> Self {
        Self {
            id: Self::composite_id(&video.device_id, &audio.device_id),
            video_device_id: video.device_id.clone(),
            audio_device_id: audio.device_id.clone(),
            video_label: video.label.clone(),
            audio_label: audio.label.clone(),
            status: Status::Initial,
            mime_type,
            file_name,
            file_type,
            is_muted: false,
            pending_chunks: 0,
            pending_bytes: 0,
            has_recorder: false,
            finalized_blob: None,
            object_url: None,
            webcam: Surface::default(),
            preview: Surface::default(),
            stats: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_artifact(&self) -> bool {
        self.finalized_blob.is_some() && self.object_url.is_some()
    }

    /// True while the webcam surface shows a live stream.
    pub fn has_stream(&self) -> bool {
        self.webcam.is_attached()
    }

    /// Name used when saving the artifact.
    pub fn download_name(&self) -> String {
        format!("{}.{}", self.file_name, self.file_type)
    }

    pub(crate) fn discard_artifact(&mut self) {
        self.finalized_blob = None;
        self.object_url = None;
        self.stats = None;
        self.pending_chunks = 0;
        self.pending_bytes = 0;
        self.preview.detach();
    }
}

/// A finalized artifact ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub file_name: String,
    pub blob: Blob,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, label: &str) -> DeviceRef {
        DeviceRef {
            device_id: id.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(
            &device("cam1", "Camera"),
            &device("mic1", "Microphone"),
            "1700000000000".to_string(),
            "webm".to_string(),
            "video/webm;codecs=vp9".to_string(),
        );
        assert_eq!(session.id, "cam1-mic1");
        assert_eq!(session.status, Status::Initial);
        assert!(!session.is_muted);
        assert!(!session.has_artifact());
        assert!(!session.has_stream());
        assert!(!session.has_recorder);
        assert_eq!(session.download_name(), "1700000000000.webm");
    }

    #[test]
    fn test_snapshot_serializes_for_ui() {
        let session = Session::new(
            &device("cam1", "Camera"),
            &device("mic1", "Microphone"),
            "take".to_string(),
            "mp4".to_string(),
            "video/mp4".to_string(),
        );
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "INITIAL");
        assert_eq!(json["videoDeviceId"], "cam1");
        assert!(json["objectURL"].is_null());
        assert!(json.get("finalizedBlob").is_none());
    }
}
