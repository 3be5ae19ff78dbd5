//! Device Directory
//!
//! One permission-gated enumeration, classified by id and by kind, with the
//! first camera and first microphone picked as defaults. The directory is a
//! snapshot; it does not track hotplug.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{RecordError, RecordResult};
use crate::permissions::{self, PermissionStatus};
use crate::platform::MediaDevices;
use crate::types::{DeviceKind, MediaDeviceInfo};

/// Entry of the by-id index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub label: String,
    pub kind: DeviceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub device_id: String,
    pub label: String,
}

/// Capture inputs grouped by kind, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicesByType {
    pub video: Vec<DeviceRef>,
    pub audio: Vec<DeviceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultDevices {
    pub video: DeviceRef,
    pub audio: DeviceRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDirectory {
    by_id: HashMap<String, DeviceEntry>,
    by_type: DevicesByType,
    defaults: DefaultDevices,
}

impl DeviceDirectory {
    /// Request permission, enumerate and classify.
    ///
    /// Fails with `PermissionDenied` when access is refused or when no
    /// camera or no microphone exists. Every call re-runs the permission
    /// flow.
    pub async fn list(devices: &dyn MediaDevices) -> RecordResult<Self> {
        let permission = permissions::request_permission(devices).await;
        if permission.status != PermissionStatus::Granted {
            return Err(RecordError::PermissionDenied(permission.message));
        }

        let listed = devices
            .enumerate_devices()
            .await
            .map_err(|e| RecordError::PermissionDenied(e.to_string()))?;

        let directory = Self::from_devices(listed)?;
        log::info!(
            "Found {} cameras and {} microphones",
            directory.by_type.video.len(),
            directory.by_type.audio.len()
        );
        Ok(directory)
    }

    /// Classify an already enumerated list. Output devices are ignored.
    pub fn from_devices(devices: Vec<MediaDeviceInfo>) -> RecordResult<Self> {
        let mut by_id = HashMap::new();
        let mut by_type = DevicesByType::default();

        for device in devices {
            let group = match device.kind {
                DeviceKind::VideoInput => &mut by_type.video,
                DeviceKind::AudioInput => &mut by_type.audio,
                DeviceKind::AudioOutput => continue,
            };
            group.push(DeviceRef {
                device_id: device.device_id.clone(),
                label: device.label.clone(),
            });
            by_id.insert(
                device.device_id,
                DeviceEntry {
                    label: device.label,
                    kind: device.kind,
                },
            );
        }

        let defaults = match (by_type.video.first(), by_type.audio.first()) {
            (Some(video), Some(audio)) => DefaultDevices {
                video: video.clone(),
                audio: audio.clone(),
            },
            (None, _) => {
                return Err(RecordError::PermissionDenied("no camera available".to_string()))
            }
            (_, None) => {
                return Err(RecordError::PermissionDenied(
                    "no microphone available".to_string(),
                ))
            }
        };

        Ok(Self {
            by_id,
            by_type,
            defaults,
        })
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.by_id.get(device_id)
    }

    pub fn by_type(&self) -> &DevicesByType {
        &self.by_type
    }

    pub fn defaults(&self) -> &DefaultDevices {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Fill missing ids with the defaults and look up both labels.
    pub fn resolve_pair(
        &self,
        video_id: Option<&str>,
        audio_id: Option<&str>,
    ) -> RecordResult<(DeviceRef, DeviceRef)> {
        let video = self.resolve(video_id, DeviceKind::VideoInput, &self.defaults.video)?;
        let audio = self.resolve(audio_id, DeviceKind::AudioInput, &self.defaults.audio)?;
        Ok((video, audio))
    }

    fn resolve(
        &self,
        requested: Option<&str>,
        kind: DeviceKind,
        fallback: &DeviceRef,
    ) -> RecordResult<DeviceRef> {
        let Some(id) = requested else {
            return Ok(fallback.clone());
        };
        match self.by_id.get(id) {
            Some(entry) if entry.kind == kind => Ok(DeviceRef {
                device_id: id.to_string(),
                label: entry.label.clone(),
            }),
            _ => Err(RecordError::DeviceUnavailable(format!(
                "unknown {:?} device {}",
                kind, id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<MediaDeviceInfo> {
        vec![
            MediaDeviceInfo::audio("mic1", "Mic One"),
            MediaDeviceInfo::video("cam1", "Cam One"),
            MediaDeviceInfo::new("out1", DeviceKind::AudioOutput, "Speakers"),
            MediaDeviceInfo::video("cam2", "Cam Two"),
        ]
    }

    #[test]
    fn test_classification() {
        let dir = DeviceDirectory::from_devices(sample()).unwrap();
        assert_eq!(dir.len(), 3);
        assert!(dir.get("out1").is_none());
        assert_eq!(dir.by_type().video.len(), 2);
        assert_eq!(dir.by_type().audio.len(), 1);
        assert_eq!(dir.defaults().video.device_id, "cam1");
        assert_eq!(dir.defaults().audio.device_id, "mic1");
        assert_eq!(dir.get("cam2").unwrap().label, "Cam Two");
    }

    #[test]
    fn test_missing_kind_is_permission_error() {
        let only_audio = vec![MediaDeviceInfo::audio("mic1", "Mic One")];
        assert!(matches!(
            DeviceDirectory::from_devices(only_audio),
            Err(RecordError::PermissionDenied(_))
        ));
        assert!(DeviceDirectory::from_devices(Vec::new()).is_err());
    }

    #[test]
    fn test_resolve_pair() {
        let dir = DeviceDirectory::from_devices(sample()).unwrap();
        let (video, audio) = dir.resolve_pair(Some("cam2"), None).unwrap();
        assert_eq!(video.label, "Cam Two");
        assert_eq!(audio.device_id, "mic1");

        assert!(dir.resolve_pair(Some("mic1"), None).is_err());
        assert!(dir.resolve_pair(None, Some("ghost")).is_err());
    }

    #[test]
    fn test_list_from_platform() {
        let platform = crate::platform::SyntheticPlatform::builder().build();
        let dir = tokio_test::block_on(DeviceDirectory::list(&platform)).unwrap();
        assert_eq!(dir.defaults().video.device_id, "cam1");
        assert_eq!(platform.live_track_count(), 0, "permission check released its stream");
    }
}
