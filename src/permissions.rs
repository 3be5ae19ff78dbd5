use crate::errors::PlatformError;
use crate::platform::{MediaDevices, MediaStream};
use crate::types::MediaStreamRequest;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Access blocked by something other than the user (no device, policy)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    pub fn is_granted(&self) -> bool {
        self.status == PermissionStatus::Granted
    }
}

/// Trigger the combined camera + microphone prompt.
///
/// A transient stream is opened purely to obtain consent and every one of
/// its tracks is stopped before returning, so no hardware stays locked.
pub async fn request_permission(devices: &dyn MediaDevices) -> PermissionInfo {
    log::info!("Requesting camera and microphone permission");

    match devices.get_user_media(&MediaStreamRequest::any()).await {
        Ok(stream) => {
            release(stream.as_ref());
            PermissionInfo {
                status: PermissionStatus::Granted,
                message: "Camera and microphone access granted".to_string(),
                can_request: false,
            }
        }
        Err(PlatformError::NotAllowed(msg)) => {
            log::warn!("Permission refused: {}", msg);
            PermissionInfo {
                status: PermissionStatus::Denied,
                message: format!("Camera and microphone access denied: {}", msg),
                can_request: true,
            }
        }
        Err(PlatformError::NotFound(msg)) => PermissionInfo {
            status: PermissionStatus::Restricted,
            message: format!("No capture device available: {}", msg),
            can_request: false,
        },
        Err(e) => PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: format!("Permission request failed: {}", e),
            can_request: true,
        },
    }
}

fn release(stream: &dyn MediaStream) {
    for track in stream.tracks() {
        track.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SyntheticPlatform;

    #[tokio::test]
    async fn test_granted_releases_transient_stream() {
        let platform = SyntheticPlatform::builder().build();
        let info = request_permission(&platform).await;
        assert!(info.is_granted());
        assert_eq!(platform.streams_opened(), 1);
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_denied() {
        let platform = SyntheticPlatform::builder().deny_permission().build();
        let info = request_permission(&platform).await;
        assert_eq!(info.status, PermissionStatus::Denied);
        assert!(info.can_request);
    }

    #[tokio::test]
    async fn test_no_devices_is_restricted() {
        let platform = SyntheticPlatform::builder().devices(Vec::new()).build();
        let info = request_permission(&platform).await;
        assert_eq!(info.status, PermissionStatus::Restricted);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
    }
}
