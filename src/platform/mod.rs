//! Platform seam for capture and recording primitives
//!
//! These traits mirror the browser media APIs the recording core is built
//! against: a device list with a permission-gated stream factory, live
//! tracks, and a chunked recorder that confirms every lifecycle change
//! asynchronously through an ordered event channel.
//!
//! The crate ships one implementation, [`synthetic::SyntheticPlatform`],
//! which runs entirely in process.

pub mod synthetic;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::PlatformError;
use crate::recording::RecorderOptions;
use crate::types::{MediaDeviceInfo, MediaStreamRequest, MediaTrackConstraints, TrackKind};

pub use synthetic::{SyntheticPlatform, SyntheticPlatformBuilder};

/// Device list and stream factory (`navigator.mediaDevices`).
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a live stream. Fails with `NotAllowed` when access is refused and
    /// `NotFound`/`NotReadable` when a device is missing or busy.
    async fn get_user_media(
        &self,
        request: &MediaStreamRequest,
    ) -> Result<Arc<dyn MediaStream>, PlatformError>;

    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError>;
}

/// A live capture stream made of tracks.
pub trait MediaStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>>;

    fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks()
            .into_iter()
            .filter(|t| t.kind() == TrackKind::Audio)
            .collect()
    }

    fn video_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks()
            .into_iter()
            .filter(|t| t.kind() == TrackKind::Video)
            .collect()
    }

    /// True while at least one track is still live.
    fn is_active(&self) -> bool {
        self.tracks().iter().any(|t| t.is_live())
    }
}

/// One audio or video track of a stream.
#[async_trait]
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn label(&self) -> &str;
    fn device_id(&self) -> &str;

    fn enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);

    /// Release the underlying hardware. Stopping twice is a no-op.
    fn stop(&self);
    fn is_live(&self) -> bool;

    async fn apply_constraints(&self, constraints: &MediaTrackConstraints)
        -> Result<(), PlatformError>;

    /// Constraints currently in effect.
    fn constraints(&self) -> MediaTrackConstraints;
}

/// Recorder state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
    Paused,
}

/// Lifecycle and data events, delivered in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Start,
    DataAvailable(Bytes),
    Pause,
    Resume,
    /// Fired once, after the final `DataAvailable`.
    Stop,
    Error(PlatformError),
}

pub type RecorderEvents = mpsc::UnboundedReceiver<RecorderEvent>;

/// Chunked recording primitive (`MediaRecorder`).
///
/// Calls return once the request has been accepted. The state change itself
/// is confirmed later by the matching [`RecorderEvent`].
pub trait MediaRecorder: Send + Sync + fmt::Debug {
    fn state(&self) -> RecorderState;
    fn mime_type(&self) -> &str;

    fn start(&self, time_slice: Option<Duration>) -> Result<(), PlatformError>;
    fn pause(&self) -> Result<(), PlatformError>;
    fn resume(&self) -> Result<(), PlatformError>;
    fn stop(&self) -> Result<(), PlatformError>;
}

/// Recorder factory plus codec support query.
pub trait RecorderPlatform: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create_recorder(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
    ) -> Result<(Box<dyn MediaRecorder>, RecorderEvents), PlatformError>;
}

/// The set of backends a registry runs against.
#[derive(Clone)]
pub struct Platform {
    pub devices: Arc<dyn MediaDevices>,
    pub recorders: Arc<dyn RecorderPlatform>,
}

impl Platform {
    pub fn new(devices: Arc<dyn MediaDevices>, recorders: Arc<dyn RecorderPlatform>) -> Self {
        Self { devices, recorders }
    }

    /// In-process platform with two cameras and two microphones.
    pub fn synthetic() -> Self {
        SyntheticPlatform::builder().build().into_platform()
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}
