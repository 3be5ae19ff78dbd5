use serde::{Deserialize, Serialize};

use super::state::Session;
use crate::types::Status;

/// User actions a UI exposes per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    Open,
    Close,
    Start,
    Stop,
    Pause,
    Resume,
    Mute,
    ClearPreview,
    Download,
    Cancel,
}

impl Control {
    pub const ALL: [Control; 10] = [
        Control::Open,
        Control::Close,
        Control::Start,
        Control::Stop,
        Control::Pause,
        Control::Resume,
        Control::Mute,
        Control::ClearPreview,
        Control::Download,
        Control::Cancel,
    ];
}

impl Session {
    /// Whether `control` should be enabled for the current snapshot.
    pub fn allows(&self, control: Control) -> bool {
        match control {
            Control::Open => matches!(
                self.status,
                Status::Initial | Status::Closed | Status::Error | Status::Stopped
            ),
            Control::Close => self.status != Status::Closed,
            Control::Start => {
                !self.status.is_capturing() && self.status != Status::Closed && self.has_stream()
            }
            Control::Stop => {
                self.status.is_capturing() || (self.status == Status::Error && self.has_recorder)
            }
            Control::Pause => self.status == Status::Recording,
            Control::Resume => self.status == Status::Paused,
            Control::Mute => self.has_stream(),
            Control::ClearPreview => self.status == Status::Stopped,
            Control::Download => self.has_artifact(),
            Control::Cancel => true,
        }
    }

    pub fn enabled_controls(&self) -> Vec<Control> {
        Control::ALL
            .iter()
            .copied()
            .filter(|c| self.allows(*c))
            .collect()
    }
}
