//! Hook-style facade over one session registry
//!
//! `RecordWebcam` is what a host embeds: it lists devices once at
//! construction, owns a [`SessionRegistry`] and exposes every lifecycle
//! operation under the names a UI binds its buttons to. State flows back
//! through [`RecordWebcam::subscribe`].
//!
//! ```rust,ignore
//! use record_webcam::{Platform, RecordWebcam, RecordWebcamConfig};
//!
//! let webcam = RecordWebcam::new(Platform::synthetic(), RecordWebcamConfig::default()).await?;
//! let session = webcam.create_recording(None, None)?;
//! webcam.open_camera(&session.id).await?;
//! webcam.start_recording(&session.id).await?;
//! let stopped = webcam.stop_recording(&session.id).await?;
//! let download = webcam.download(&stopped.id)?;
//! webcam.teardown().await;
//! ```

use std::sync::Arc;
use tokio::sync::watch;

use crate::config::RecordWebcamConfig;
use crate::devices::DeviceDirectory;
use crate::errors::{ErrorContext, RecordError, RecordResult};
use crate::platform::Platform;
use crate::session::{Control, Download, RegistryOptions, RegistrySnapshot, Session, SessionRegistry};
use crate::types::MediaTrackConstraints;

#[derive(Debug, Clone)]
pub struct RecordWebcam {
    config: RecordWebcamConfig,
    registry: SessionRegistry,
}

impl RecordWebcam {
    /// Validate `config`, list devices and build the registry.
    ///
    /// Device listing failures are fatal: without a camera and a
    /// microphone nothing can be recorded.
    pub async fn new(platform: Platform, config: RecordWebcamConfig) -> RecordResult<Self> {
        config.validate().map_err(RecordError::Config)?;

        let directory = match DeviceDirectory::list(platform.devices.as_ref()).await {
            Ok(directory) => directory,
            Err(e) => {
                log::error!("Device listing failed: {}", e);
                return Err(e);
            }
        };
        let registry = SessionRegistry::new(platform, directory, RegistryOptions::from_config(&config));
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &RecordWebcamConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn devices(&self) -> &DeviceDirectory {
        self.registry.directory()
    }

    pub fn create_recording(
        &self,
        video_id: Option<&str>,
        audio_id: Option<&str>,
    ) -> RecordResult<Arc<Session>> {
        self.registry.create_session(video_id, audio_id)
    }

    pub async fn open_camera(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.open_camera(id).await
    }

    pub async fn close_camera(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.close_camera(id).await
    }

    pub async fn start_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.start_recording(id).await
    }

    pub async fn pause_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.pause_recording(id).await
    }

    pub async fn resume_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.resume_recording(id).await
    }

    pub async fn stop_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.stop_recording(id).await
    }

    pub async fn cancel_recording(&self, id: &str) -> RecordResult<()> {
        self.registry.cancel_recording(id).await
    }

    pub async fn mute_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.mute_recording(id).await
    }

    pub async fn clear_preview(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.clear_preview(id).await
    }

    pub async fn clear_all_recordings(&self) {
        self.registry.clear_all_sessions().await
    }

    pub async fn apply_constraints(
        &self,
        id: &str,
        constraints: &MediaTrackConstraints,
    ) -> RecordResult<Arc<Session>> {
        self.registry.apply_constraints(id, constraints).await
    }

    /// Copy the configured download naming onto a session.
    pub async fn apply_recording_options(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry
            .apply_recording_options(id, &self.config.options)
            .await
    }

    pub fn download(&self, id: &str) -> RecordResult<Download> {
        self.registry.download(id)
    }

    pub fn get_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.registry.get_recording(id)
    }

    pub fn active_recordings(&self) -> Vec<Arc<Session>> {
        self.registry.active_recordings()
    }

    pub fn is_recording_created(&self, id: &str) -> bool {
        self.registry.is_recording_created(id)
    }

    /// Controls a UI should enable for the session right now.
    pub fn controls(&self, id: &str) -> RecordResult<Vec<Control>> {
        Ok(self.get_recording(id)?.enabled_controls())
    }

    pub fn subscribe(&self) -> RecordResult<watch::Receiver<RegistrySnapshot>> {
        self.registry.subscribe()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn error(&self) -> Option<ErrorContext> {
        self.registry.last_error()
    }

    /// The last error's message, as a UI would show it.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.message)
    }

    pub fn clear_error(&self) {
        self.registry.clear_error()
    }

    /// Release every camera and microphone. Call on host unmount.
    pub async fn teardown(&self) {
        log::info!("Tearing down {} sessions", self.active_recordings().len());
        self.registry.clear_all_sessions().await;
    }
}
