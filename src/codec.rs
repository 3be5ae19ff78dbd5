//! Mime type parsing, default codec selection and support tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parsed `type/subtype;codecs=a,b` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeType {
    pub container: String,
    pub codecs: Vec<String>,
}

impl MimeType {
    /// Parse a recording mime string. Returns `None` for anything that is not
    /// `type/subtype` with an optional `codecs` parameter.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split(';');
        let container = parts.next()?.trim().to_ascii_lowercase();
        let (kind, subtype) = container.split_once('/')?;
        if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return None;
        }

        let mut codecs = Vec::new();
        for param in parts {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("codecs") {
                codecs = value
                    .trim()
                    .trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect();
            }
        }

        Some(Self { container, codecs })
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.codecs.is_empty() {
            write!(f, "{}", self.container)
        } else {
            write!(f, "{};codecs={}", self.container, self.codecs.join(","))
        }
    }
}

/// Default recording mime type for a download extension.
pub fn default_mime_for_file_type(file_type: &str) -> String {
    match file_type.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "webm" => "video/webm;codecs=vp9".to_string(),
        "mp4" => "video/mp4;codecs=avc1,mp4a.40.2".to_string(),
        "mkv" => "video/x-matroska;codecs=avc1".to_string(),
        other => format!("video/{}", other),
    }
}

/// Recording mime type actually used: explicit override first, else derived
/// from the file type.
pub fn resolve_mime_type(override_mime: Option<&str>, file_type: &str) -> String {
    match override_mime {
        Some(mime) if !mime.trim().is_empty() => mime.trim().to_string(),
        _ => default_mime_for_file_type(file_type),
    }
}

/// Containers and codecs a recorder implementation accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecTable {
    pub containers: Vec<String>,
    pub codecs: Vec<String>,
}

impl Default for CodecTable {
    fn default() -> Self {
        Self {
            containers: ["video/webm", "audio/webm", "video/mp4", "video/x-matroska"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            codecs: ["vp8", "vp9", "av1", "h264", "avc1", "opus", "pcm", "mp4a.40.2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CodecTable {
    pub fn is_supported(&self, mime: &str) -> bool {
        let Some(parsed) = MimeType::parse(mime) else {
            return false;
        };
        self.containers.iter().any(|c| *c == parsed.container)
            && parsed.codecs.iter().all(|codec| self.supports_codec(codec))
    }

    fn supports_codec(&self, codec: &str) -> bool {
        // avc1.42E01E style profile strings match on their family prefix
        let family = codec.split('.').next().unwrap_or(codec);
        self.codecs
            .iter()
            .any(|known| known == codec || known == family)
    }
}
