//! Synthetic media for offline recording
//!
//! Chunks are filled with a pattern that shifts with every sequence number,
//! so concatenation order is visible in the finalized artifact. A small
//! container-style header marks each chunk, which lets tests count and
//! order chunks without a real demuxer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::MediaDeviceInfo;

/// Magic prefix of every synthetic chunk.
pub const CHUNK_MAGIC: &[u8; 4] = b"SYNC";

/// Header length: magic + big-endian u32 sequence number.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Create one synthetic recorder chunk of `payload_len` bytes after the header.
pub fn synthetic_media_chunk(sequence: u32, payload_len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(CHUNK_HEADER_LEN + payload_len);
    buf.put_slice(CHUNK_MAGIC);
    buf.put_u32(sequence);

    // Gradient that changes each chunk
    let base = (sequence % 256) as u8;
    for i in 0..payload_len {
        buf.put_u8(base.wrapping_add((i % 256) as u8));
    }

    buf.freeze()
}

/// Split a concatenated artifact back into chunk sequence numbers.
///
/// Returns `None` when the data is not a run of well-formed chunks of
/// `payload_len` bytes each.
pub fn chunk_sequences(data: &[u8], payload_len: usize) -> Option<Vec<u32>> {
    let stride = CHUNK_HEADER_LEN + payload_len;
    if data.len() % stride != 0 {
        return None;
    }

    data.chunks(stride)
        .map(|chunk| {
            if &chunk[..4] != CHUNK_MAGIC {
                return None;
            }
            let mut seq = [0u8; 4];
            seq.copy_from_slice(&chunk[4..8]);
            Some(u32::from_be_bytes(seq))
        })
        .collect()
}

/// Device set the synthetic platform exposes by default
pub struct SyntheticRig {
    pub cameras: Vec<(&'static str, &'static str)>,
    pub microphones: Vec<(&'static str, &'static str)>,
    /// Output devices are enumerated but never selectable for capture
    pub speakers: Vec<(&'static str, &'static str)>,
}

impl Default for SyntheticRig {
    fn default() -> Self {
        Self {
            cameras: vec![
                ("cam1", "Synthetic HD Camera"),
                ("cam2", "Synthetic Document Camera"),
            ],
            microphones: vec![
                ("mic1", "Synthetic Array Microphone"),
                ("mic2", "Synthetic Headset Microphone"),
            ],
            speakers: vec![("speaker1", "Synthetic Speakers")],
        }
    }
}

impl SyntheticRig {
    /// Enumeration order: microphones, cameras, speakers.
    pub fn devices(&self) -> Vec<MediaDeviceInfo> {
        let audio = self
            .microphones
            .iter()
            .map(|(id, label)| MediaDeviceInfo::audio(*id, *label));
        let video = self
            .cameras
            .iter()
            .map(|(id, label)| MediaDeviceInfo::video(*id, *label));
        let out = self.speakers.iter().map(|(id, label)| {
            MediaDeviceInfo::new(*id, crate::types::DeviceKind::AudioOutput, *label)
        });
        audio.chain(video).chain(out).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_chunk_correct_size() {
        let chunk = synthetic_media_chunk(0, 64);
        assert_eq!(chunk.len(), CHUNK_HEADER_LEN + 64);
        assert_eq!(&chunk[..4], CHUNK_MAGIC);
    }

    #[test]
    fn test_synthetic_chunks_differ() {
        let chunk0 = synthetic_media_chunk(0, 32);
        let chunk1 = synthetic_media_chunk(1, 32);
        assert_ne!(chunk0[CHUNK_HEADER_LEN], chunk1[CHUNK_HEADER_LEN]);
    }

    #[test]
    fn test_sequences_recovered_in_order() {
        let mut joined = Vec::new();
        for seq in [0u32, 1, 2, 7] {
            joined.extend_from_slice(&synthetic_media_chunk(seq, 16));
        }
        assert_eq!(chunk_sequences(&joined, 16), Some(vec![0, 1, 2, 7]));
        assert_eq!(chunk_sequences(&joined[1..], 16), None);
    }

    #[test]
    fn test_default_rig_enumeration() {
        let devices = SyntheticRig::default().devices();
        assert_eq!(devices.len(), 5);
        assert_eq!(devices[0].device_id, "mic1");
        assert!(devices.iter().any(|d| d.device_id == "cam2"));
    }
}
