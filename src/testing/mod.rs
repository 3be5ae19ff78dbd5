//! Testing utilities for record-webcam
//!
//! Provides synthetic media chunks and device sets so the full recording
//! lifecycle can run without hardware.

pub mod synthetic_data;

pub use synthetic_data::{
    chunk_sequences,
    synthetic_media_chunk,
    SyntheticRig,
    CHUNK_HEADER_LEN,
};
