//! Capture Stream Adapter

use std::fmt;
use std::sync::Arc;

use crate::errors::{PlatformError, RecordResult};
use crate::platform::{MediaDevices, MediaStream};
use crate::types::{MediaStreamRequest, MediaTrackConstraints, TrackKind};

/// Live stream for one device pair.
#[derive(Clone)]
pub struct CaptureStream {
    stream: Arc<dyn MediaStream>,
    video_id: String,
    audio_id: String,
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("id", &self.stream.id())
            .field("video_id", &self.video_id)
            .field("audio_id", &self.audio_id)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Open a stream scoped to exact device ids and apply `constraints` to
/// every track. A track that rejects its constraints keeps its defaults.
pub async fn open_stream(
    devices: &dyn MediaDevices,
    video_id: &str,
    audio_id: &str,
    constraints: &MediaTrackConstraints,
) -> RecordResult<CaptureStream> {
    let stream = devices
        .get_user_media(&MediaStreamRequest::exact(video_id, audio_id))
        .await
        .map_err(PlatformError::into_stream_error)?;

    let capture = CaptureStream {
        stream,
        video_id: video_id.to_string(),
        audio_id: audio_id.to_string(),
    };

    if !constraints.is_empty() {
        if let Err(e) = capture.apply_constraints(constraints).await {
            log::warn!("Stream {} kept default constraints: {}", capture.id(), e);
        }
    }

    log::info!("Opened stream {} for {}-{}", capture.id(), video_id, audio_id);
    Ok(capture)
}

/// Stop every track. Safe to call more than once.
pub fn close_stream(capture: &CaptureStream) {
    capture.stop();
}

impl CaptureStream {
    pub fn id(&self) -> &str {
        self.stream.id()
    }

    pub fn stream(&self) -> Arc<dyn MediaStream> {
        self.stream.clone()
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn audio_id(&self) -> &str {
        &self.audio_id
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_active()
    }

    /// Returns how many audio tracks were updated.
    pub fn set_audio_enabled(&self, enabled: bool) -> usize {
        let tracks = self.stream.audio_tracks();
        for track in &tracks {
            track.set_enabled(enabled);
        }
        tracks.len()
    }

    /// Re-apply constraints to the live tracks without reopening.
    pub async fn apply_constraints(&self, constraints: &MediaTrackConstraints) -> RecordResult<()> {
        for track in self.stream.tracks() {
            track
                .apply_constraints(constraints)
                .await
                .map_err(PlatformError::into_stream_error)?;
            log::debug!(
                "Applied constraints to {} track {}",
                match track.kind() {
                    TrackKind::Audio => "audio",
                    TrackKind::Video => "video",
                },
                track.id()
            );
        }
        Ok(())
    }

    pub fn stop(&self) {
        let mut stopped = 0;
        for track in self.stream.tracks() {
            if track.is_live() {
                track.stop();
                stopped += 1;
            }
        }
        if stopped > 0 {
            log::debug!("Stopped {} tracks of stream {}", stopped, self.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecordError;
    use crate::platform::SyntheticPlatform;

    fn hd() -> MediaTrackConstraints {
        MediaTrackConstraints {
            width: Some(1280),
            height: Some(720),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_applies_constraints_to_every_track() {
        let platform = SyntheticPlatform::builder().build();
        let capture = open_stream(&platform, "cam2", "mic2", &hd()).await.unwrap();

        let tracks = capture.stream().tracks();
        assert_eq!(tracks.len(), 2);
        for track in tracks {
            assert_eq!(track.constraints().width, Some(1280));
        }
        assert_eq!(capture.video_id(), "cam2");
        assert_eq!(capture.audio_id(), "mic2");
    }

    #[tokio::test]
    async fn test_busy_device_is_unavailable() {
        let platform = SyntheticPlatform::builder().busy_device("cam1").build();
        let err = open_stream(&platform, "cam1", "mic1", &hd()).await.unwrap_err();
        assert!(matches!(err, RecordError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let platform = SyntheticPlatform::builder().build();
        let capture = open_stream(&platform, "cam1", "mic1", &hd()).await.unwrap();
        assert!(capture.is_live());

        close_stream(&capture);
        close_stream(&capture);
        assert!(!capture.is_live());
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_audio_toggle() {
        let platform = SyntheticPlatform::builder().build();
        let capture = open_stream(&platform, "cam1", "mic1", &hd()).await.unwrap();
        assert_eq!(capture.set_audio_enabled(false), 1);
        assert!(capture.stream().audio_tracks().iter().all(|t| !t.enabled()));
        assert!(capture.stream().video_tracks().iter().all(|t| t.enabled()));
    }
}
