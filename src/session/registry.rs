//! Session Registry
//!
//! Owns every session of one facade instance and the transition logic for
//! each lifecycle operation. Snapshots are published through a watch
//! channel after every mutation.
//!
//! Each session has an async operation lock held for the whole duration of
//! an operation, so overlapping calls on one id run one after another.
//! Calls on different ids never contend. The session map and snapshot
//! locks are synchronous and never held across an await.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::JoinHandle;

use super::state::{Download, Session};
use crate::assert_invariant;
use crate::blob::{Blob, ObjectUrl, ObjectUrlStore};
use crate::config::{FileOptions, RecordWebcamConfig};
use crate::devices::DeviceDirectory;
use crate::errors::{ErrorContext, PlatformError, RecordError, RecordResult};
use crate::platform::Platform;
use crate::recording::{ChunkCallback, RecorderAdapter, RecorderOptions};
use crate::stream::{self, CaptureStream};
use crate::types::{MediaTrackConstraints, Status, SurfaceSource};

/// Settings a registry applies to every session it owns.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub constraints: MediaTrackConstraints,
    pub recorder: RecorderOptions,
    pub file_name: Option<String>,
    pub file_type: String,
    pub time_slice: Option<Duration>,
    pub recording_length: Option<Duration>,
    pub settle_delay: Duration,
    pub confirm_timeout: Duration,
    pub max_subscribers: usize,
    pub dev_mode: bool,
}

impl RegistryOptions {
    pub fn from_config(config: &RecordWebcamConfig) -> Self {
        Self {
            constraints: config.track_constraints(),
            recorder: config.recorder_options(),
            file_name: config.options.file_name.clone(),
            file_type: config.options.file_type.clone(),
            time_slice: config.time_slice(),
            recording_length: config.recording_length(),
            settle_delay: config.settle_delay(),
            confirm_timeout: config.confirm_timeout(),
            max_subscribers: config.session.max_subscribers,
            dev_mode: config.session.dev_mode,
        }
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self::from_config(&RecordWebcamConfig::default())
    }
}

/// Published state: every session in creation order plus the error slot.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Increases by one with every publish
    pub revision: u64,
    pub sessions: Vec<Arc<Session>>,
    pub last_error: Option<ErrorContext>,
}

impl RegistrySnapshot {
    pub fn get(&self, id: &str) -> Option<&Arc<Session>> {
        self.sessions.iter().find(|s| s.id == id)
    }
}

/// Resources a session owns that never appear in its snapshot.
#[derive(Default)]
struct Runtime {
    stream: Option<CaptureStream>,
    recorder: Option<RecorderAdapter>,
    auto_stop: Option<JoinHandle<()>>,
    /// Bumped per take so a stale auto-stop timer is ignored
    generation: u64,
    removed: bool,
}

impl Runtime {
    fn live_stream(&self) -> Option<&CaptureStream> {
        self.stream.as_ref().filter(|s| s.is_live())
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.auto_stop.take() {
            timer.abort();
        }
    }

    /// Stop the recorder and every track.
    fn release(&mut self) {
        self.cancel_timer();
        if let Some(mut recorder) = self.recorder.take() {
            recorder.force_stop();
        }
        if let Some(capture) = self.stream.take() {
            stream::close_stream(&capture);
        }
    }
}

struct SessionSlot {
    seq: u64,
    snapshot: RwLock<Arc<Session>>,
    runtime: AsyncMutex<Runtime>,
}

impl SessionSlot {
    fn snapshot(&self) -> Arc<Session> {
        self.snapshot.read().clone()
    }

    fn status(&self) -> Status {
        self.snapshot.read().status
    }

    /// Replace the snapshot with an edited copy.
    fn update(&self, edit: impl FnOnce(&mut Session)) -> Arc<Session> {
        let mut current = self.snapshot.write();
        let mut next = (**current).clone();
        edit(&mut next);
        let next = Arc::new(next);
        *current = next.clone();
        next
    }
}

struct Inner {
    platform: Platform,
    directory: Arc<DeviceDirectory>,
    options: RegistryOptions,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
    urls: ObjectUrlStore,
    last_error: Mutex<Option<ErrorContext>>,
    next_seq: AtomicU64,
    updates: watch::Sender<RegistrySnapshot>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slots: Vec<Arc<SessionSlot>> = self.sessions.get_mut().drain().map(|(_, s)| s).collect();
        let mut released = 0;
        for slot in slots {
            if let Ok(mut runtime) = slot.runtime.try_lock() {
                runtime.release();
                released += 1;
            }
        }
        let revoked = self.urls.revoke_all();
        if released > 0 || revoked > 0 {
            log::debug!(
                "Registry dropped: released {} sessions, revoked {} object URLs",
                released,
                revoked
            );
        }
    }
}

/// Cloneable handle to one registry. Dropping the last handle stops every
/// live track.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.inner.sessions.read().len())
            .field("object_urls", &self.inner.urls.live_count())
            .finish()
    }
}

fn settle(slot: &SessionSlot, outcome: RecordResult<()>) -> RecordResult<Arc<Session>> {
    match outcome {
        Ok(()) => Ok(slot.snapshot()),
        Err(error) => {
            slot.update(|s| s.status = Status::Error);
            Err(error)
        }
    }
}

impl SessionRegistry {
    pub fn new(platform: Platform, directory: DeviceDirectory, options: RegistryOptions) -> Self {
        let (updates, _) = watch::channel(RegistrySnapshot::default());
        Self {
            inner: Arc::new(Inner {
                platform,
                directory: Arc::new(directory),
                options,
                sessions: RwLock::new(HashMap::new()),
                urls: ObjectUrlStore::new(),
                last_error: Mutex::new(None),
                next_seq: AtomicU64::new(0),
                updates,
            }),
        }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.inner.directory
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.inner.options
    }

    /// Insert a session for a device pair, filling missing ids with the
    /// directory defaults. No stream is opened.
    pub fn create_session(
        &self,
        video_id: Option<&str>,
        audio_id: Option<&str>,
    ) -> RecordResult<Arc<Session>> {
        let result = self.insert_session(video_id, audio_id);
        let failed_id = match &result {
            Err(RecordError::DuplicateSession(id)) => Some(id.clone()),
            _ => None,
        };
        self.conclude("createRecording", failed_id.as_deref(), result)
    }

    pub async fn open_camera(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.open_inner(id).await;
        self.conclude("openCamera", Some(id), result)
    }

    pub async fn start_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.start_inner(id).await;
        self.conclude("startRecording", Some(id), result)
    }

    pub async fn pause_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.pause_inner(id).await;
        self.conclude("pauseRecording", Some(id), result)
    }

    pub async fn resume_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.resume_inner(id).await;
        self.conclude("resumeRecording", Some(id), result)
    }

    /// Waits for the recorder's finalize signal before building the artifact.
    pub async fn stop_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.stop_inner(id).await;
        self.conclude("stopRecording", Some(id), result)
    }

    /// Closing a closed session returns it unchanged.
    pub async fn close_camera(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.close_inner(id).await;
        self.conclude("closeCamera", Some(id), result)
    }

    /// Force-stop everything and remove the session.
    pub async fn cancel_recording(&self, id: &str) -> RecordResult<()> {
        let result = self.cancel_inner(id).await;
        self.conclude("cancelRecording", Some(id), result)
    }

    pub async fn mute_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.mute_inner(id).await;
        self.conclude("muteRecording", Some(id), result)
    }

    pub async fn clear_preview(&self, id: &str) -> RecordResult<Arc<Session>> {
        let result = self.clear_preview_inner(id).await;
        self.conclude("clearPreview", Some(id), result)
    }

    /// Re-apply constraints to the live tracks. No-op without a stream.
    pub async fn apply_constraints(
        &self,
        id: &str,
        constraints: &MediaTrackConstraints,
    ) -> RecordResult<Arc<Session>> {
        let result = self.apply_constraints_inner(id, constraints).await;
        self.conclude("applyConstraints", Some(id), result)
    }

    /// Copy download naming onto a session. A missing file name keeps the
    /// session's current one.
    pub async fn apply_recording_options(
        &self,
        id: &str,
        options: &FileOptions,
    ) -> RecordResult<Arc<Session>> {
        let result = self.apply_recording_options_inner(id, options).await;
        self.conclude("applyRecordingOptions", Some(id), result)
    }

    /// Stop every stream and recorder, revoke every URL and empty the map.
    pub async fn clear_all_sessions(&self) {
        let slots: Vec<(String, Arc<SessionSlot>)> = self.inner.sessions.write().drain().collect();
        let count = slots.len();
        for (_, slot) in slots {
            let mut runtime = slot.runtime.lock().await;
            runtime.release();
            runtime.removed = true;
            if let Some(url) = &slot.snapshot().object_url {
                self.inner.urls.revoke(url);
            }
        }
        log::info!("Cleared {} sessions", count);
        self.publish();
    }

    /// The finalized artifact with its download name. Never changes status.
    pub fn download(&self, id: &str) -> RecordResult<Download> {
        let result = self.slot(id).and_then(|slot| {
            let session = slot.snapshot();
            match (&session.finalized_blob, &session.object_url) {
                (Some(blob), Some(_)) => Ok(Download {
                    file_name: session.download_name(),
                    blob: blob.clone(),
                }),
                _ => Err(RecordError::NoArtifact(id.to_string())),
            }
        });
        if let Err(error) = &result {
            self.record_error("download", Some(id), error);
            self.publish();
        }
        result
    }

    pub fn get_recording(&self, id: &str) -> RecordResult<Arc<Session>> {
        self.slot(id).map(|slot| slot.snapshot())
    }

    pub fn is_recording_created(&self, id: &str) -> bool {
        self.inner.sessions.read().contains_key(id)
    }

    /// Every session in creation order.
    pub fn active_recordings(&self) -> Vec<Arc<Session>> {
        self.ordered_slots().iter().map(|s| s.snapshot()).collect()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.inner.updates.borrow().clone()
    }

    /// Receive every published snapshot. Do not hold a `borrow()` of the
    /// receiver across calls into the registry.
    pub fn subscribe(&self) -> RecordResult<watch::Receiver<RegistrySnapshot>> {
        let limit = self.inner.options.max_subscribers;
        if self.inner.updates.receiver_count() >= limit {
            return Err(RecordError::SubscriberLimit(limit));
        }
        Ok(self.inner.updates.subscribe())
    }

    pub fn last_error(&self) -> Option<ErrorContext> {
        self.inner.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        self.inner.last_error.lock().take();
        self.publish();
    }

    pub fn resolve_url(&self, url: &ObjectUrl) -> Option<Blob> {
        self.inner.urls.resolve(url)
    }

    pub fn live_object_urls(&self) -> usize {
        self.inner.urls.live_count()
    }

    fn insert_session(
        &self,
        video_id: Option<&str>,
        audio_id: Option<&str>,
    ) -> RecordResult<Arc<Session>> {
        let (video, audio) = self.inner.directory.resolve_pair(video_id, audio_id)?;
        let id = Session::composite_id(&video.device_id, &audio.device_id);

        let options = &self.inner.options;
        let file_name = options
            .file_name
            .clone()
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        let session = Session::new(
            &video,
            &audio,
            file_name,
            options.file_type.clone(),
            options.recorder.mime_type.clone(),
        );
        assert_invariant!(
            session.id == format!("{}-{}", video.device_id, audio.device_id),
            "Session id joins the video and audio device ids",
            "create_session"
        );

        let mut sessions = self.inner.sessions.write();
        if sessions.contains_key(&id) {
            return Err(RecordError::DuplicateSession(id));
        }
        let slot = Arc::new(SessionSlot {
            seq: self.inner.next_seq.fetch_add(1, Ordering::SeqCst),
            snapshot: RwLock::new(Arc::new(session)),
            runtime: AsyncMutex::new(Runtime::default()),
        });
        let snapshot = slot.snapshot();
        sessions.insert(id.clone(), slot);
        assert_invariant!(
            sessions.values().filter(|s| s.snapshot().id == id).count() == 1,
            "At most one session exists per device pair",
            "create_session"
        );

        log::info!("Created session {} ({} / {})", id, video.label, audio.label);
        Ok(snapshot)
    }

    async fn open_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let outcome = self.open_locked(&slot, &mut runtime).await;
        settle(&slot, outcome)
    }

    async fn open_locked(&self, slot: &SessionSlot, runtime: &mut Runtime) -> RecordResult<()> {
        let current = slot.snapshot();
        if current.status.is_capturing() {
            return Err(RecordError::invalid_state("open camera", current.status));
        }
        if let Some(previous) = runtime.stream.take() {
            stream::close_stream(&previous);
        }

        let opened = stream::open_stream(
            self.inner.platform.devices.as_ref(),
            &current.video_device_id,
            &current.audio_device_id,
            &self.inner.options.constraints,
        )
        .await;
        let capture = match opened {
            Ok(capture) => capture,
            Err(error) => {
                slot.update(|s| s.webcam.detach());
                return Err(error);
            }
        };
        if current.is_muted {
            capture.set_audio_enabled(false);
        }
        let stream_id = capture.id().to_string();
        runtime.stream = Some(capture);

        // Hardware settle time before the session is reported open
        if !self.inner.options.settle_delay.is_zero() {
            tokio::time::sleep(self.inner.options.settle_delay).await;
        }

        slot.update(|s| {
            s.status = Status::Open;
            s.webcam.attach(SurfaceSource::Stream(stream_id));
        });
        log::info!("Camera open for {}", current.id);
        Ok(())
    }

    async fn start_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let outcome = self.start_locked(&slot, &mut runtime).await;
        settle(&slot, outcome)
    }

    async fn start_locked(&self, slot: &Arc<SessionSlot>, runtime: &mut Runtime) -> RecordResult<()> {
        let current = slot.snapshot();
        if current.status.is_capturing() || current.status == Status::Closed {
            return Err(RecordError::invalid_state("start recording", current.status));
        }
        let capture = runtime
            .live_stream()
            .cloned()
            .ok_or_else(|| RecordError::invalid_state("start recording", current.status))?;

        // A recorder left behind by a failed take is discarded
        runtime.cancel_timer();
        if let Some(mut stale) = runtime.recorder.take() {
            stale.force_stop();
            slot.update(|s| s.has_recorder = false);
        }

        let options = &self.inner.options.recorder;
        if !self.inner.platform.recorders.is_type_supported(&options.mime_type) {
            log::warn!("Codec not supported: {}", options.mime_type);
            self.record_error(
                "startRecording",
                Some(&current.id),
                &RecordError::CodecNotSupported(options.mime_type.clone()),
            );
        }

        let (recorder, events) = self
            .inner
            .platform
            .recorders
            .create_recorder(capture.stream(), options)
            .map_err(PlatformError::into_recorder_error)?;
        let mut adapter = RecorderAdapter::new(recorder, events, Some(self.chunk_callback(slot)));

        let confirmed = adapter
            .start(self.inner.options.time_slice, self.inner.options.confirm_timeout)
            .await;
        if let Err(error) = confirmed {
            adapter.force_stop();
            return Err(error);
        }

        if let Some(url) = &current.object_url {
            self.inner.urls.revoke(url);
        }
        let (chunks, bytes) = (adapter.chunk_count(), adapter.buffered_bytes());
        runtime.recorder = Some(adapter);
        runtime.generation += 1;

        let mime_type = options.mime_type.clone();
        slot.update(|s| {
            s.discard_artifact();
            s.status = Status::Recording;
            s.has_recorder = true;
            s.mime_type = mime_type;
            s.pending_chunks = chunks;
            s.pending_bytes = bytes;
        });

        if let Some(length) = self.inner.options.recording_length {
            runtime.auto_stop = Some(self.spawn_auto_stop(current.id.clone(), runtime.generation, length));
        }
        assert_invariant!(
            runtime.recorder.is_some(),
            "A capturing session owns a recorder",
            "start_recording"
        );
        log::info!("Recording started for {}", current.id);
        Ok(())
    }

    async fn pause_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let outcome = self.pause_locked(&slot, &mut runtime).await;
        settle(&slot, outcome)
    }

    async fn pause_locked(&self, slot: &SessionSlot, runtime: &mut Runtime) -> RecordResult<()> {
        let status = slot.status();
        if status != Status::Recording {
            return Err(RecordError::invalid_state("pause", status));
        }
        let adapter = runtime
            .recorder
            .as_mut()
            .ok_or_else(|| RecordError::Recorder("no active recorder".to_string()))?;
        adapter.pause(self.inner.options.confirm_timeout).await?;

        slot.update(|s| s.status = Status::Paused);
        log::info!("Recording paused for {}", slot.snapshot().id);
        Ok(())
    }

    async fn resume_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let outcome = self.resume_locked(&slot, &mut runtime).await;
        settle(&slot, outcome)
    }

    async fn resume_locked(&self, slot: &SessionSlot, runtime: &mut Runtime) -> RecordResult<()> {
        let status = slot.status();
        if status != Status::Paused {
            return Err(RecordError::invalid_state("resume", status));
        }
        let adapter = runtime
            .recorder
            .as_mut()
            .ok_or_else(|| RecordError::Recorder("no active recorder".to_string()))?;
        adapter.resume(self.inner.options.confirm_timeout).await?;

        slot.update(|s| s.status = Status::Recording);
        assert_invariant!(
            runtime.recorder.is_some(),
            "A capturing session owns a recorder",
            "resume_recording"
        );
        log::info!("Recording resumed for {}", slot.snapshot().id);
        Ok(())
    }

    async fn stop_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let outcome = self.stop_locked(&slot, &mut runtime, false).await;
        settle(&slot, outcome)
    }

    async fn stop_locked(
        &self,
        slot: &SessionSlot,
        runtime: &mut Runtime,
        from_timer: bool,
    ) -> RecordResult<()> {
        let status = slot.status();
        // An errored take that still owns its recorder can be finalized
        let recoverable = status == Status::Error && runtime.recorder.is_some();
        if !(status.is_capturing() || recoverable) {
            return Err(RecordError::invalid_state("stop", status));
        }

        if from_timer {
            runtime.auto_stop.take();
        } else {
            runtime.cancel_timer();
        }

        let mut adapter = runtime
            .recorder
            .take()
            .ok_or_else(|| RecordError::StopRecording("no active recorder".to_string()))?;
        let chunks = match adapter.stop(self.inner.options.confirm_timeout).await {
            Ok(chunks) => chunks,
            Err(error) => {
                runtime.recorder = Some(adapter);
                return Err(error);
            }
        };
        let stats = adapter.stats(&chunks);
        drop(adapter);

        let mime_type = slot.snapshot().mime_type.clone();
        let blob = Blob::concat(&chunks, &mime_type);
        let url = self.inner.urls.create(&blob);
        assert_invariant!(
            self.inner.urls.resolve(&url).is_some(),
            "An artifact's object URL stays live until revoked",
            "stop_recording"
        );

        let size = blob.size();
        let stopped = slot.update(|s| {
            s.status = Status::Stopped;
            s.has_recorder = false;
            s.finalized_blob = Some(blob);
            s.object_url = Some(url.clone());
            s.preview.attach(SurfaceSource::Url(url));
            s.pending_chunks = 0;
            s.pending_bytes = 0;
            s.stats = Some(stats);
        });
        assert_invariant!(
            stopped.has_artifact(),
            "A stopped session owns a finalized artifact",
            "stop_recording"
        );
        log::info!(
            "Recording stopped for {}: {} chunks, {} bytes",
            stopped.id,
            chunks.len(),
            size
        );
        Ok(())
    }

    async fn close_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        if slot.status() == Status::Closed {
            return Ok(slot.snapshot());
        }

        runtime.release();
        assert_invariant!(
            runtime.stream.is_none() && runtime.recorder.is_none(),
            "A closed session holds no stream or recorder",
            "close_camera"
        );
        let closed = slot.update(|s| {
            s.status = Status::Closed;
            s.has_recorder = false;
            s.webcam.detach();
            s.pending_chunks = 0;
            s.pending_bytes = 0;
        });
        log::info!("Camera closed for {}", id);
        Ok(closed)
    }

    async fn cancel_inner(&self, id: &str) -> RecordResult<()> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;

        runtime.release();
        runtime.removed = true;
        if let Some(url) = &slot.snapshot().object_url {
            self.inner.urls.revoke(url);
        }
        self.inner.sessions.write().remove(id);
        log::info!("Cancelled session {}", id);
        Ok(())
    }

    async fn mute_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let runtime = self.lock(&slot, id).await?;
        let outcome = Self::toggle_mute(&slot, &runtime);
        settle(&slot, outcome)
    }

    fn toggle_mute(slot: &SessionSlot, runtime: &Runtime) -> RecordResult<()> {
        let current = slot.snapshot();
        let capture = runtime
            .live_stream()
            .ok_or_else(|| RecordError::invalid_state("mute", current.status))?;
        let muted = !current.is_muted;
        capture.set_audio_enabled(!muted);
        slot.update(|s| s.is_muted = muted);
        log::debug!("Session {} muted: {}", current.id, muted);
        Ok(())
    }

    async fn clear_preview_inner(&self, id: &str) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        let current = slot.snapshot();
        let outcome = if current.status.is_capturing() {
            Err(RecordError::invalid_state("clear preview", current.status))
        } else {
            if let Some(mut stale) = runtime.recorder.take() {
                stale.force_stop();
            }
            if let Some(url) = &current.object_url {
                self.inner.urls.revoke(url);
            }
            slot.update(|s| {
                s.discard_artifact();
                s.status = Status::Initial;
                s.has_recorder = false;
            });
            Ok(())
        };
        settle(&slot, outcome)
    }

    async fn apply_constraints_inner(
        &self,
        id: &str,
        constraints: &MediaTrackConstraints,
    ) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let runtime = self.lock(&slot, id).await?;
        let outcome = match runtime.live_stream() {
            Some(capture) => capture.apply_constraints(constraints).await,
            None => Ok(()),
        };
        settle(&slot, outcome)
    }

    async fn apply_recording_options_inner(
        &self,
        id: &str,
        options: &FileOptions,
    ) -> RecordResult<Arc<Session>> {
        let slot = self.slot(id)?;
        let _runtime = self.lock(&slot, id).await?;
        let file_name = options.file_name.clone();
        let file_type = options.file_type.clone();
        Ok(slot.update(|s| {
            if let Some(name) = file_name {
                s.file_name = name;
            }
            s.file_type = file_type;
        }))
    }

    fn spawn_auto_stop(&self, id: String, generation: u64, after: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = registry.upgrade() {
                SessionRegistry { inner }.auto_stop(&id, generation).await;
            }
        })
    }

    async fn auto_stop(&self, id: &str, generation: u64) {
        let result = self.auto_stop_inner(id, generation).await;
        match result {
            Ok(None) | Err(RecordError::NotFound(_)) => {}
            other => {
                let _ = self.conclude("stopRecording", Some(id), other);
            }
        }
    }

    async fn auto_stop_inner(&self, id: &str, generation: u64) -> RecordResult<Option<Arc<Session>>> {
        let slot = self.slot(id)?;
        let mut runtime = self.lock(&slot, id).await?;
        if runtime.generation != generation || runtime.recorder.is_none() {
            return Ok(None);
        }
        log::info!("Recording length reached for {}", id);
        let outcome = self.stop_locked(&slot, &mut runtime, true).await;
        settle(&slot, outcome).map(Some)
    }

    fn chunk_callback(&self, slot: &Arc<SessionSlot>) -> ChunkCallback {
        let registry = Arc::downgrade(&self.inner);
        let slot = Arc::downgrade(slot);
        Arc::new(move |chunks, bytes| {
            let (Some(inner), Some(slot)) = (registry.upgrade(), slot.upgrade()) else {
                return;
            };
            slot.update(|s| {
                if s.status.is_capturing() {
                    s.pending_chunks = s.pending_chunks.max(chunks);
                    s.pending_bytes = s.pending_bytes.max(bytes);
                }
            });
            SessionRegistry { inner }.publish();
        })
    }

    fn slot(&self, id: &str) -> RecordResult<Arc<SessionSlot>> {
        self.inner
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }

    async fn lock<'a>(
        &self,
        slot: &'a SessionSlot,
        id: &str,
    ) -> RecordResult<AsyncMutexGuard<'a, Runtime>> {
        let runtime = slot.runtime.lock().await;
        if runtime.removed {
            return Err(RecordError::NotFound(id.to_string()));
        }
        Ok(runtime)
    }

    fn ordered_slots(&self) -> Vec<Arc<SessionSlot>> {
        let mut slots: Vec<Arc<SessionSlot>> = self.inner.sessions.read().values().cloned().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots
    }

    fn conclude<T>(&self, operation: &str, session_id: Option<&str>, result: RecordResult<T>) -> RecordResult<T> {
        if let Err(error) = &result {
            self.record_error(operation, session_id, error);
        }
        self.publish();
        result
    }

    fn record_error(&self, operation: &str, session_id: Option<&str>, error: &RecordError) {
        if self.inner.options.dev_mode {
            log::error!("@{}: {}", operation, error);
        } else {
            log::warn!("{} failed: {}", operation, error);
        }
        *self.inner.last_error.lock() = Some(ErrorContext::new(operation, session_id, error));
    }

    fn publish(&self) {
        self.inner.updates.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.sessions = self.ordered_slots().iter().map(|s| s.snapshot()).collect();
            snapshot.last_error = self.inner.last_error.lock().clone();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SyntheticPlatform;
    use crate::testing::SyntheticRig;

    fn registry() -> SessionRegistry {
        let directory = DeviceDirectory::from_devices(SyntheticRig::default().devices()).unwrap();
        let options = RegistryOptions {
            settle_delay: Duration::ZERO,
            ..RegistryOptions::default()
        };
        SessionRegistry::new(Platform::synthetic(), directory, options)
    }

    #[test]
    fn test_defaults_fill_missing_ids() {
        let registry = registry();
        let session = registry.create_session(None, None).unwrap();
        assert_eq!(session.id, "cam1-mic1");
        assert_eq!(session.video_label, "Synthetic HD Camera");
        assert_eq!(session.file_type, "webm");
        assert!(session.file_name.parse::<i64>().is_ok());
    }

    #[test]
    fn test_creation_order_is_kept() {
        let registry = registry();
        registry.create_session(Some("cam2"), Some("mic2")).unwrap();
        registry.create_session(Some("cam1"), Some("mic2")).unwrap();
        registry.create_session(Some("cam1"), Some("mic1")).unwrap();
        let ids: Vec<String> = registry.active_recordings().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec!["cam2-mic2", "cam1-mic2", "cam1-mic1"]);
    }

    #[test]
    fn test_each_publish_bumps_revision() {
        let registry = registry();
        let before = registry.snapshot().revision;
        registry.create_session(None, None).unwrap();
        let _ = registry.create_session(None, None);
        let after = registry.snapshot();
        assert_eq!(after.revision, before + 2);
        assert_eq!(after.last_error.unwrap().code, "SESSION_EXISTS");
    }

    #[test]
    fn test_subscriber_limit() {
        let directory = DeviceDirectory::from_devices(SyntheticRig::default().devices()).unwrap();
        let options = RegistryOptions {
            max_subscribers: 1,
            ..RegistryOptions::default()
        };
        let registry = SessionRegistry::new(Platform::synthetic(), directory, options);
        let _first = registry.subscribe().unwrap();
        assert_eq!(registry.subscribe().unwrap_err(), RecordError::SubscriberLimit(1));
    }

    #[tokio::test]
    async fn test_dropping_registry_stops_tracks() {
        let synthetic = SyntheticPlatform::builder().build();
        let directory = DeviceDirectory::from_devices(SyntheticRig::default().devices()).unwrap();
        let options = RegistryOptions {
            settle_delay: Duration::ZERO,
            ..RegistryOptions::default()
        };
        let registry = SessionRegistry::new(synthetic.clone().into_platform(), directory, options);
        registry.create_session(None, None).unwrap();
        registry.open_camera("cam1-mic1").await.unwrap();
        assert_eq!(synthetic.live_track_count(), 2);

        drop(registry);
        assert_eq!(synthetic.live_track_count(), 0);
    }
}
