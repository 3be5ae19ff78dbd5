//! record-webcam: multi-session webcam and microphone recording
//!
//! This crate manages any number of concurrent recording sessions, one per
//! camera/microphone pair, each moving through an explicit lifecycle
//! (open, record, pause, resume, stop, preview, download, close).
//!
//! # Features
//! - Per-session state machine with serialized operations per session
//! - Immutable session snapshots published to subscribers
//! - Recorder confirmation and finalize handling with bounded timeouts
//! - Object URL bookkeeping for finalized artifacts
//! - Pluggable platform backends, with a synthetic one for tests and the CLI
//!
//! # Usage
//! ```rust,ignore
//! use record_webcam::{init_logging, Platform, RecordWebcam, RecordWebcamConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     init_logging();
//!     let webcam = RecordWebcam::new(Platform::synthetic(), RecordWebcamConfig::load_or_default()).await?;
//!     let session = webcam.create_recording(Some("cam1"), Some("mic1"))?;
//!     webcam.open_camera(&session.id).await?;
//!     webcam.start_recording(&session.id).await?;
//!     webcam.stop_recording(&session.id).await?;
//!     webcam.teardown().await;
//!     Ok(())
//! }
//! ```
pub mod blob;
pub mod codec;
pub mod config;
pub mod devices;
pub mod errors;
pub mod facade;
pub mod invariant_ppt;
pub mod permissions;
pub mod platform;
pub mod recording;
pub mod session;
pub mod stream;
pub mod types;

// Testing utilities - synthetic media for offline testing
pub mod testing;

// Re-exports for convenience
pub use blob::{Blob, ObjectUrl};
pub use config::RecordWebcamConfig;
pub use devices::DeviceDirectory;
pub use errors::{ErrorContext, PlatformError, RecordError, RecordResult};
pub use facade::RecordWebcam;
pub use platform::{Platform, SyntheticPlatform};
pub use session::{Control, Download, RegistryOptions, RegistrySnapshot, Session, SessionRegistry};
pub use types::{MediaTrackConstraints, Status};

/// Initialize logging for the recording core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "record_webcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "record-webcam");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
        log::info!("logging initialized twice without panicking");
    }
}
