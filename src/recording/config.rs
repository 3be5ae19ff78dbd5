//! Recorder configuration types

use serde::{Deserialize, Serialize};

use crate::codec;

/// Options handed to the platform recorder on construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
    /// Container and codec string, e.g. `video/webm;codecs=vp9`
    pub mime_type: String,
    /// Target audio bitrate in bits per second
    pub audio_bits_per_second: u32,
    /// Target video bitrate in bits per second
    pub video_bits_per_second: u32,
}

impl RecorderOptions {
    /// Create options for an explicit mime type with default bitrates
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..Self::default()
        }
    }

    /// Create options whose mime type is derived from a download extension
    pub fn for_file_type(file_type: &str) -> Self {
        Self::new(codec::default_mime_for_file_type(file_type))
    }

    /// Set the audio bitrate
    pub fn with_audio_bitrate(mut self, bits_per_second: u32) -> Self {
        self.audio_bits_per_second = bits_per_second;
        self
    }

    /// Set the video bitrate
    pub fn with_video_bitrate(mut self, bits_per_second: u32) -> Self {
        self.video_bits_per_second = bits_per_second;
        self
    }
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=vp9".to_string(),
            audio_bits_per_second: 128_000,
            video_bits_per_second: 2_500_000,
        }
    }
}

/// Statistics returned after finalizing a recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Non-empty chunks delivered by the recorder
    pub chunks: u64,
    /// Total bytes across all chunks
    pub bytes: u64,
    /// Wall-clock time from start confirmation to finalize, pauses included
    pub duration_secs: f64,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
