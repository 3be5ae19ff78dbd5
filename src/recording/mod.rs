//! Chunked recording for record-webcam
//!
//! The platform recorder reports every lifecycle change through an event
//! channel. [`RecorderAdapter`] turns that stream into awaitable operations:
//! `start`, `pause` and `resume` resolve on the matching confirmation, and
//! `stop` resolves only once the final chunk has been delivered.
//!
//! # Example
//! ```rust,ignore
//! use record_webcam::recording::{RecorderAdapter, RecorderOptions};
//!
//! let (recorder, events) = platform.recorders.create_recorder(stream, &RecorderOptions::default())?;
//! let mut adapter = RecorderAdapter::new(recorder, events, None);
//!
//! adapter.start(None, timeout).await?;
//! // ... capture ...
//! let chunks = adapter.stop(timeout).await?;
//! ```

mod adapter;
mod config;

pub use adapter::{ChunkCallback, RecorderAdapter};
pub use config::{RecorderOptions, RecordingStats};

#[cfg(test)]
mod tests;
