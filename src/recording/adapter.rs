//! Event reconciliation for a platform recorder

use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::config::RecordingStats;
use crate::errors::{PlatformError, RecordError, RecordResult};
use crate::platform::{MediaRecorder, RecorderEvent, RecorderEvents, RecorderState};

/// Invoked after every non-empty chunk with the running chunk count and
/// byte total of the current take.
pub type ChunkCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

type Confirmation = oneshot::Sender<Result<(), PlatformError>>;

#[derive(Default)]
struct Waiters {
    start: Option<Confirmation>,
    pause: Option<Confirmation>,
    resume: Option<Confirmation>,
}

impl Waiters {
    fn fail_all(&mut self, error: &PlatformError) {
        for waiter in [
            self.start.take(),
            self.pause.take(),
            self.resume.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = waiter.send(Err(error.clone()));
        }
    }
}

#[derive(Default)]
struct ChunkBuffer {
    chunks: Vec<Bytes>,
    bytes: usize,
}

/// What the event pump has seen of the end of the take.
#[derive(Debug, Clone, Copy, Default)]
struct Finalize {
    stopped: bool,
    closed: bool,
    errors: u64,
}

struct Shared {
    chunks: Mutex<ChunkBuffer>,
    waiters: Mutex<Waiters>,
    failure: Mutex<Option<PlatformError>>,
    on_chunk: Mutex<Option<ChunkCallback>>,
    finalize: watch::Sender<Finalize>,
}

#[derive(Clone, Copy)]
enum Step {
    Start,
    Pause,
    Resume,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Pause => "pause",
            Step::Resume => "resume",
        }
    }
}

/// Wraps one platform recorder for one recording take.
///
/// Chunks accumulate in delivery order. The pump records the `Stop` event
/// only after every earlier `DataAvailable` has been buffered, and keeps it,
/// so a `stop` that timed out can be retried and still finalize the take.
pub struct RecorderAdapter {
    recorder: Box<dyn MediaRecorder>,
    shared: Arc<Shared>,
    finalize: watch::Receiver<Finalize>,
    stop_requested: bool,
    finalized: bool,
    pump: JoinHandle<()>,
    started_at: Option<Instant>,
}

impl fmt::Debug for RecorderAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderAdapter")
            .field("recorder", &self.recorder)
            .field("chunks", &self.chunk_count())
            .finish()
    }
}

impl RecorderAdapter {
    /// Must be called inside a tokio runtime; the event pump is spawned here.
    pub fn new(
        recorder: Box<dyn MediaRecorder>,
        events: RecorderEvents,
        on_chunk: Option<ChunkCallback>,
    ) -> Self {
        let (finalize_tx, finalize_rx) = watch::channel(Finalize::default());
        let shared = Arc::new(Shared {
            chunks: Mutex::new(ChunkBuffer::default()),
            waiters: Mutex::new(Waiters::default()),
            failure: Mutex::new(None),
            on_chunk: Mutex::new(on_chunk),
            finalize: finalize_tx,
        });

        let pump = tokio::spawn(pump(events, shared.clone()));

        Self {
            recorder,
            shared,
            finalize: finalize_rx,
            stop_requested: false,
            finalized: false,
            pump,
            started_at: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn mime_type(&self) -> &str {
        self.recorder.mime_type()
    }

    pub async fn start(&mut self, time_slice: Option<Duration>, timeout: Duration) -> RecordResult<()> {
        self.request(Step::Start, |r| r.start(time_slice), timeout).await?;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    pub async fn pause(&mut self, timeout: Duration) -> RecordResult<()> {
        self.request(Step::Pause, |r| r.pause(), timeout).await
    }

    pub async fn resume(&mut self, timeout: Duration) -> RecordResult<()> {
        self.request(Step::Resume, |r| r.resume(), timeout).await
    }

    /// Stop and wait for the `Stop` event, then hand back every chunk.
    ///
    /// The platform recorder is asked to stop once. A call that failed or
    /// timed out can be repeated; it waits on the same event.
    pub async fn stop(&mut self, timeout: Duration) -> RecordResult<Vec<Bytes>> {
        if self.finalized {
            return Err(RecordError::StopRecording(
                "recorder already finalized".to_string(),
            ));
        }

        let baseline = self.finalize.borrow().errors;
        if !self.stop_requested {
            self.recorder
                .stop()
                .map_err(|e| RecordError::StopRecording(e.to_string()))?;
            self.stop_requested = true;
        }

        let seen = {
            let waited = tokio::time::timeout(
                timeout,
                self.finalize
                    .wait_for(|f| f.stopped || f.closed || f.errors > baseline),
            )
            .await;
            match waited {
                Ok(Ok(seen)) => *seen,
                Ok(Err(_)) => Finalize {
                    closed: true,
                    ..Finalize::default()
                },
                Err(_) => return Err(RecordError::Timeout("stop")),
            }
        };

        if !seen.stopped {
            let reason = match self.failure() {
                Some(error) if !seen.closed => error.to_string(),
                _ => "recorder closed before finalizing".to_string(),
            };
            return Err(RecordError::StopRecording(reason));
        }
        self.finalized = true;

        let chunks = self.take_chunks();
        log::debug!("Recorder finalized with {} chunks", chunks.len());
        Ok(chunks)
    }

    /// Stop without waiting for finalization and discard buffered data.
    pub fn force_stop(&mut self) {
        self.detach_chunk_callback();
        if self.recorder.state() != RecorderState::Inactive {
            if let Err(e) = self.recorder.stop() {
                log::debug!("Ignoring stop failure during teardown: {}", e);
            }
        }
        self.take_chunks();
        self.pump.abort();
    }

    pub fn detach_chunk_callback(&self) {
        self.shared.on_chunk.lock().take();
    }

    pub fn chunk_count(&self) -> usize {
        self.shared.chunks.lock().chunks.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.shared.chunks.lock().bytes
    }

    pub fn take_chunks(&self) -> Vec<Bytes> {
        let mut buffer = self.shared.chunks.lock();
        buffer.bytes = 0;
        std::mem::take(&mut buffer.chunks)
    }

    /// Most recent asynchronous recorder error, if any.
    pub fn failure(&self) -> Option<PlatformError> {
        self.shared.failure.lock().clone()
    }

    pub fn stats(&self, chunks: &[Bytes]) -> RecordingStats {
        RecordingStats {
            chunks: chunks.len() as u64,
            bytes: chunks.iter().map(|c| c.len() as u64).sum(),
            duration_secs: self
                .started_at
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }

    async fn request<F>(&mut self, step: Step, call: F, timeout: Duration) -> RecordResult<()>
    where
        F: FnOnce(&dyn MediaRecorder) -> Result<(), PlatformError>,
    {
        let (tx, rx) = oneshot::channel();
        self.arm(step, Some(tx));

        if let Err(e) = call(self.recorder.as_ref()) {
            self.arm(step, None);
            return Err(e.into_recorder_error());
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result.map_err(PlatformError::into_recorder_error),
            Ok(Err(_)) => Err(RecordError::Recorder(format!(
                "recorder closed before confirming {}",
                step.name()
            ))),
            Err(_) => {
                self.arm(step, None);
                Err(RecordError::Timeout(step.name()))
            }
        }
    }

    fn arm(&self, step: Step, waiter: Option<Confirmation>) {
        let mut waiters = self.shared.waiters.lock();
        let slot = match step {
            Step::Start => &mut waiters.start,
            Step::Pause => &mut waiters.pause,
            Step::Resume => &mut waiters.resume,
        };
        *slot = waiter;
    }
}

impl Drop for RecorderAdapter {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(mut events: RecorderEvents, shared: Arc<Shared>) {
    while let Some(event) = events.recv().await {
        match event {
            RecorderEvent::DataAvailable(chunk) => {
                if chunk.is_empty() {
                    continue;
                }
                let totals = {
                    let mut buffer = shared.chunks.lock();
                    buffer.bytes += chunk.len();
                    buffer.chunks.push(chunk);
                    (buffer.chunks.len(), buffer.bytes)
                };
                let callback = shared.on_chunk.lock().clone();
                if let Some(callback) = callback {
                    callback(totals.0, totals.1);
                }
            }
            RecorderEvent::Start => confirm(shared.waiters.lock().start.take()),
            RecorderEvent::Pause => confirm(shared.waiters.lock().pause.take()),
            RecorderEvent::Resume => confirm(shared.waiters.lock().resume.take()),
            RecorderEvent::Stop => {
                shared.finalize.send_modify(|f| f.stopped = true);
                return;
            }
            RecorderEvent::Error(error) => {
                log::error!("Recorder reported error: {}", error);
                shared.waiters.lock().fail_all(&error);
                *shared.failure.lock() = Some(error);
                shared.finalize.send_modify(|f| f.errors += 1);
            }
        }
    }

    // Channel closed without a Stop event
    shared.waiters.lock().fail_all(&PlatformError::Other(
        "recorder event channel closed".to_string(),
    ));
    shared.finalize.send_modify(|f| f.closed = true);
}

fn confirm(waiter: Option<Confirmation>) {
    if let Some(waiter) = waiter {
        let _ = waiter.send(Ok(()));
    }
}
