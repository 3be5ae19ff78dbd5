//! In-process platform backed by synthetic devices
//!
//! Behaves like a browser media stack closely enough to drive the whole
//! session lifecycle: permission refusal, busy devices, per-track
//! constraints, codec tables, asynchronous start/pause/resume confirmation,
//! time-sliced chunk delivery and a final flush before `Stop`.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{
    MediaDevices, MediaRecorder, MediaStream, MediaTrack, Platform, RecorderEvent,
    RecorderEvents, RecorderPlatform, RecorderState,
};
use crate::codec::CodecTable;
use crate::errors::PlatformError;
use crate::recording::RecorderOptions;
use crate::testing::{synthetic_media_chunk, SyntheticRig};
use crate::types::{
    DeviceKind, MediaDeviceInfo, MediaStreamRequest, MediaTrackConstraints, TrackKind,
    TrackRequest,
};

const DEFAULT_CHUNK_PAYLOAD: usize = 256;

pub struct SyntheticPlatformBuilder {
    devices: Vec<MediaDeviceInfo>,
    deny_permission: bool,
    busy: HashSet<String>,
    codecs: CodecTable,
    strict_codecs: bool,
    chunk_payload: usize,
    confirm_delay: Duration,
    finalize_delay: Duration,
    stall_confirmations: bool,
    fail_stop: bool,
}

impl Default for SyntheticPlatformBuilder {
    fn default() -> Self {
        Self {
            devices: SyntheticRig::default().devices(),
            deny_permission: false,
            busy: HashSet::new(),
            codecs: CodecTable::default(),
            strict_codecs: false,
            chunk_payload: DEFAULT_CHUNK_PAYLOAD,
            confirm_delay: Duration::ZERO,
            finalize_delay: Duration::ZERO,
            stall_confirmations: false,
            fail_stop: false,
        }
    }
}

impl SyntheticPlatformBuilder {
    pub fn devices(mut self, devices: Vec<MediaDeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    pub fn rig(mut self, rig: SyntheticRig) -> Self {
        self.devices = rig.devices();
        self
    }

    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Opening this device fails with `NotReadable`.
    pub fn busy_device(mut self, device_id: impl Into<String>) -> Self {
        self.busy.insert(device_id.into());
        self
    }

    pub fn codecs(mut self, table: CodecTable) -> Self {
        self.codecs = table;
        self
    }

    /// Refuse to construct recorders for unsupported mime types, the way a
    /// browser `MediaRecorder` constructor does.
    pub fn strict_codecs(mut self) -> Self {
        self.strict_codecs = true;
        self
    }

    pub fn chunk_payload(mut self, len: usize) -> Self {
        self.chunk_payload = len;
        self
    }

    /// Delay before each recorder event is delivered.
    pub fn confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    /// Extra delay before the final chunk and `Stop` of a take, like an
    /// encoder that is slow to flush.
    pub fn finalize_delay(mut self, delay: Duration) -> Self {
        self.finalize_delay = delay;
        self
    }

    /// Swallow start/pause/resume confirmations.
    pub fn stall_confirmations(mut self) -> Self {
        self.stall_confirmations = true;
        self
    }

    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn build(self) -> SyntheticPlatform {
        SyntheticPlatform {
            shared: Arc::new(Shared {
                devices: Mutex::new(self.devices),
                deny_permission: AtomicBool::new(self.deny_permission),
                busy: Mutex::new(self.busy),
                codecs: self.codecs,
                strict_codecs: self.strict_codecs,
                chunk_payload: self.chunk_payload,
                confirm_delay: self.confirm_delay,
                finalize_delay: self.finalize_delay,
                stall_confirmations: AtomicBool::new(self.stall_confirmations),
                fail_stop: AtomicBool::new(self.fail_stop),
                tracks: Mutex::new(Vec::new()),
                streams_opened: AtomicUsize::new(0),
                recorders_created: AtomicUsize::new(0),
            }),
        }
    }
}

struct Shared {
    devices: Mutex<Vec<MediaDeviceInfo>>,
    deny_permission: AtomicBool,
    busy: Mutex<HashSet<String>>,
    codecs: CodecTable,
    strict_codecs: bool,
    chunk_payload: usize,
    confirm_delay: Duration,
    finalize_delay: Duration,
    stall_confirmations: AtomicBool,
    fail_stop: AtomicBool,
    tracks: Mutex<Vec<Arc<SyntheticTrack>>>,
    streams_opened: AtomicUsize,
    recorders_created: AtomicUsize,
}

/// Cloneable handle; clones share devices, toggles and counters.
#[derive(Clone)]
pub struct SyntheticPlatform {
    shared: Arc<Shared>,
}

impl fmt::Debug for SyntheticPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticPlatform")
            .field("devices", &self.shared.devices.lock().len())
            .field("live_tracks", &self.live_track_count())
            .finish()
    }
}

impl SyntheticPlatform {
    pub fn builder() -> SyntheticPlatformBuilder {
        SyntheticPlatformBuilder::default()
    }

    pub fn into_platform(self) -> Platform {
        Platform::new(Arc::new(self.clone()), Arc::new(self))
    }

    pub fn set_permission_denied(&self, denied: bool) {
        self.shared.deny_permission.store(denied, Ordering::SeqCst);
    }

    pub fn set_device_busy(&self, device_id: &str, busy: bool) {
        let mut set = self.shared.busy.lock();
        if busy {
            set.insert(device_id.to_string());
        } else {
            set.remove(device_id);
        }
    }

    /// Unplug a device. Live tracks keep running; later opens fail.
    pub fn remove_device(&self, device_id: &str) {
        self.shared
            .devices
            .lock()
            .retain(|d| d.device_id != device_id);
    }

    pub fn set_stall_confirmations(&self, stall: bool) {
        self.shared.stall_confirmations.store(stall, Ordering::SeqCst);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.shared.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn streams_opened(&self) -> usize {
        self.shared.streams_opened.load(Ordering::SeqCst)
    }

    pub fn recorders_created(&self) -> usize {
        self.shared.recorders_created.load(Ordering::SeqCst)
    }

    pub fn live_track_count(&self) -> usize {
        self.shared.tracks.lock().iter().filter(|t| t.is_live()).count()
    }

    /// Live tracks currently capturing from `device_id`.
    pub fn live_tracks_for(&self, device_id: &str) -> Vec<Arc<dyn MediaTrack>> {
        self.shared
            .tracks
            .lock()
            .iter()
            .filter(|t| t.device_id == device_id && t.is_live())
            .map(|t| t.clone() as Arc<dyn MediaTrack>)
            .collect()
    }

    fn resolve(
        &self,
        request: &TrackRequest,
        kind: DeviceKind,
    ) -> Result<Option<MediaDeviceInfo>, PlatformError> {
        let devices = self.shared.devices.lock();
        let found = match request {
            TrackRequest::Disabled => return Ok(None),
            TrackRequest::Any => devices.iter().find(|d| d.kind == kind),
            TrackRequest::Exact(id) => devices
                .iter()
                .find(|d| d.kind == kind && d.device_id == *id),
        };

        let device = found.cloned().ok_or_else(|| match request {
            TrackRequest::Exact(id) => PlatformError::NotFound(id.clone()),
            _ => PlatformError::NotFound(format!("no {:?} device", kind)),
        })?;

        if self.shared.busy.lock().contains(&device.device_id) {
            return Err(PlatformError::NotReadable(format!(
                "{} is in use by another application",
                device.device_id
            )));
        }
        Ok(Some(device))
    }

    fn open_track(&self, device: &MediaDeviceInfo, kind: TrackKind) -> Arc<SyntheticTrack> {
        let track = Arc::new(SyntheticTrack {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: device.label.clone(),
            device_id: device.device_id.clone(),
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            constraints: Mutex::new(MediaTrackConstraints::default()),
        });
        self.shared.tracks.lock().push(track.clone());
        track
    }
}

#[async_trait]
impl MediaDevices for SyntheticPlatform {
    async fn get_user_media(
        &self,
        request: &MediaStreamRequest,
    ) -> Result<Arc<dyn MediaStream>, PlatformError> {
        if self.shared.deny_permission.load(Ordering::SeqCst) {
            return Err(PlatformError::NotAllowed("Permission denied by user".to_string()));
        }

        // Resolve both kinds before opening anything so a failure leaks no tracks
        let video = self.resolve(&request.video, DeviceKind::VideoInput)?;
        let audio = self.resolve(&request.audio, DeviceKind::AudioInput)?;
        if video.is_none() && audio.is_none() {
            return Err(PlatformError::Other(
                "at least one of audio and video must be requested".to_string(),
            ));
        }

        let mut tracks = Vec::new();
        if let Some(device) = video {
            tracks.push(self.open_track(&device, TrackKind::Video));
        }
        if let Some(device) = audio {
            tracks.push(self.open_track(&device, TrackKind::Audio));
        }

        self.shared.streams_opened.fetch_add(1, Ordering::SeqCst);
        let stream = SyntheticStream {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        };
        log::debug!("Synthetic stream {} opened", stream.id);
        Ok(Arc::new(stream))
    }

    async fn enumerate_devices(&self) -> Result<Vec<MediaDeviceInfo>, PlatformError> {
        Ok(self.shared.devices.lock().clone())
    }
}

impl RecorderPlatform for SyntheticPlatform {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.shared.codecs.is_supported(mime_type)
    }

    fn create_recorder(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
    ) -> Result<(Box<dyn MediaRecorder>, RecorderEvents), PlatformError> {
        if self.shared.strict_codecs && !self.is_type_supported(&options.mime_type) {
            return Err(PlatformError::NotSupported(format!(
                "{} is not a supported recording type",
                options.mime_type
            )));
        }
        if !stream.is_active() {
            return Err(PlatformError::InvalidState("stream is inactive".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlatformError::Other(format!("no async runtime: {}", e)))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let core = Arc::new(RecorderCore {
            state: Mutex::new(RecorderState::Inactive),
            sequence: AtomicU32::new(0),
            payload: self.shared.chunk_payload,
            ticker: Mutex::new(None),
        });

        runtime.spawn(dispatch(
            outbox_rx,
            events_tx,
            core.clone(),
            self.shared.clone(),
        ));

        self.shared.recorders_created.fetch_add(1, Ordering::SeqCst);
        let recorder = SyntheticRecorder {
            core,
            outbox: outbox_tx,
            stream,
            mime_type: options.mime_type.clone(),
            finished: AtomicBool::new(false),
            shared: self.shared.clone(),
        };
        Ok((Box::new(recorder), events_rx))
    }
}

#[derive(Debug)]
pub struct SyntheticStream {
    id: String,
    tracks: Vec<Arc<SyntheticTrack>>,
}

impl MediaStream for SyntheticStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks
            .iter()
            .map(|t| t.clone() as Arc<dyn MediaTrack>)
            .collect()
    }
}

#[derive(Debug)]
pub struct SyntheticTrack {
    id: String,
    kind: TrackKind,
    label: String,
    device_id: String,
    enabled: AtomicBool,
    live: AtomicBool,
    constraints: Mutex<MediaTrackConstraints>,
}

#[async_trait]
impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("Synthetic track {} ({}) stopped", self.id, self.device_id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn apply_constraints(
        &self,
        constraints: &MediaTrackConstraints,
    ) -> Result<(), PlatformError> {
        if !self.is_live() {
            return Err(PlatformError::InvalidState(format!("track {} has ended", self.id)));
        }
        if self.kind == TrackKind::Video
            && (constraints.width == Some(0) || constraints.height == Some(0))
        {
            return Err(PlatformError::Other(
                "overconstrained: resolution must be non-zero".to_string(),
            ));
        }
        let mut current = self.constraints.lock();
        *current = current.merged_with(constraints);
        Ok(())
    }

    fn constraints(&self) -> MediaTrackConstraints {
        self.constraints.lock().clone()
    }
}

#[derive(Debug)]
struct RecorderCore {
    state: Mutex<RecorderState>,
    sequence: AtomicU32,
    payload: usize,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl RecorderCore {
    fn next_chunk(&self) -> Bytes {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        synthetic_media_chunk(seq, self.payload)
    }
}

enum Outgoing {
    Confirm(RecorderEvent),
    Ticker(Duration),
    Finish(Bytes),
}

/// Delivers queued confirmations in submission order.
async fn dispatch(
    mut outbox: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<RecorderEvent>,
    core: Arc<RecorderCore>,
    shared: Arc<Shared>,
) {
    while let Some(item) = outbox.recv().await {
        if shared.confirm_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(shared.confirm_delay).await;
        }
        let stalled = shared.stall_confirmations.load(Ordering::SeqCst);

        match item {
            Outgoing::Confirm(event) => {
                if !stalled {
                    let _ = events.send(event);
                }
            }
            Outgoing::Ticker(slice) => {
                if !stalled {
                    let handle = tokio::spawn(tick(core.clone(), events.clone(), slice));
                    *core.ticker.lock() = Some(handle);
                }
            }
            Outgoing::Finish(last) => {
                if let Some(ticker) = core.ticker.lock().take() {
                    ticker.abort();
                }
                if !shared.finalize_delay.is_zero() {
                    tokio::time::sleep(shared.finalize_delay).await;
                }
                let _ = events.send(RecorderEvent::DataAvailable(last));
                let _ = events.send(RecorderEvent::Stop);
                break;
            }
        }
    }
}

async fn tick(core: Arc<RecorderCore>, events: mpsc::UnboundedSender<RecorderEvent>, slice: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + slice, slice);
    loop {
        interval.tick().await;
        // Checked and sent under the state lock so no chunk follows a stop
        let delivered = {
            let state = core.state.lock();
            match *state {
                RecorderState::Inactive => None,
                RecorderState::Paused => Some(true),
                RecorderState::Recording => {
                    Some(events.send(RecorderEvent::DataAvailable(core.next_chunk())).is_ok())
                }
            }
        };
        match delivered {
            None | Some(false) => break,
            Some(true) => {}
        }
    }
}

pub struct SyntheticRecorder {
    core: Arc<RecorderCore>,
    outbox: mpsc::UnboundedSender<Outgoing>,
    stream: Arc<dyn MediaStream>,
    mime_type: String,
    finished: AtomicBool,
    shared: Arc<Shared>,
}

impl fmt::Debug for SyntheticRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticRecorder")
            .field("stream", &self.stream.id())
            .field("mime_type", &self.mime_type)
            .field("state", &*self.core.state.lock())
            .finish()
    }
}

impl SyntheticRecorder {
    fn send(&self, item: Outgoing) {
        let _ = self.outbox.send(item);
    }
}

impl MediaRecorder for SyntheticRecorder {
    fn state(&self) -> RecorderState {
        *self.core.state.lock()
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn start(&self, time_slice: Option<Duration>) -> Result<(), PlatformError> {
        let mut state = self.core.state.lock();
        if *state != RecorderState::Inactive || self.finished.load(Ordering::SeqCst) {
            return Err(PlatformError::InvalidState(format!(
                "cannot start a recorder that is {:?}",
                *state
            )));
        }
        if !self.stream.is_active() {
            return Err(PlatformError::InvalidState("stream is inactive".to_string()));
        }
        *state = RecorderState::Recording;
        self.send(Outgoing::Confirm(RecorderEvent::Start));
        if let Some(slice) = time_slice {
            self.send(Outgoing::Ticker(slice));
        }
        Ok(())
    }

    fn pause(&self) -> Result<(), PlatformError> {
        let mut state = self.core.state.lock();
        if *state != RecorderState::Recording {
            return Err(PlatformError::InvalidState(format!(
                "cannot pause a recorder that is {:?}",
                *state
            )));
        }
        *state = RecorderState::Paused;
        self.send(Outgoing::Confirm(RecorderEvent::Pause));
        Ok(())
    }

    fn resume(&self) -> Result<(), PlatformError> {
        let mut state = self.core.state.lock();
        if *state != RecorderState::Paused {
            return Err(PlatformError::InvalidState(format!(
                "cannot resume a recorder that is {:?}",
                *state
            )));
        }
        *state = RecorderState::Recording;
        self.send(Outgoing::Confirm(RecorderEvent::Resume));
        Ok(())
    }

    fn stop(&self) -> Result<(), PlatformError> {
        if self.shared.fail_stop.load(Ordering::SeqCst) {
            return Err(PlatformError::Other(
                "synthetic encoder failed to finalize".to_string(),
            ));
        }
        let mut state = self.core.state.lock();
        if *state == RecorderState::Inactive {
            return Err(PlatformError::InvalidState(
                "cannot stop an inactive recorder".to_string(),
            ));
        }
        *state = RecorderState::Inactive;
        self.finished.store(true, Ordering::SeqCst);
        self.send(Outgoing::Finish(self.core.next_chunk()));
        Ok(())
    }
}

impl Drop for SyntheticRecorder {
    fn drop(&mut self) {
        *self.core.state.lock() = RecorderState::Inactive;
        if let Some(ticker) = self.core.ticker.lock().take() {
            ticker.abort();
        }
    }
}
