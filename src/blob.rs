//! Finalized recording artifacts and the object URLs that reference them.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Immutable binary artifact with its mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
    mime_type: String,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Join chunks in delivery order.
    pub fn concat(chunks: &[Bytes], mime_type: &str) -> Self {
        let total = chunks.iter().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }
        Self::new(buf.freeze(), mime_type)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// `blob:` URL minted for a finalized artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const URL_PREFIX: &str = "blob:record-webcam/";

/// Owner of every live object URL. A URL stays resolvable until revoked.
#[derive(Debug, Default)]
pub struct ObjectUrlStore {
    live: Mutex<HashMap<ObjectUrl, Blob>>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, blob: &Blob) -> ObjectUrl {
        let url = ObjectUrl(format!("{}{}", URL_PREFIX, uuid::Uuid::new_v4()));
        self.live.lock().insert(url.clone(), blob.clone());
        log::debug!("Minted {} ({} bytes)", url, blob.size());
        url
    }

    /// Release a URL. Returns false when it was not live.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let removed = self.live.lock().remove(url).is_some();
        if removed {
            log::debug!("Revoked {}", url);
        }
        removed
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.live.lock().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn revoke_all(&self) -> usize {
        let mut live = self.live.lock();
        let count = live.len();
        live.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_preserves_order() {
        let chunks = vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd"), Bytes::new()];
        let blob = Blob::concat(&chunks, "video/webm");
        assert_eq!(blob.data().as_ref(), b"abcd");
        assert_eq!(blob.mime_type(), "video/webm");
        assert_eq!(blob.size(), 4);
    }

    #[test]
    fn test_url_lifecycle() {
        let store = ObjectUrlStore::new();
        let blob = Blob::new(Bytes::from_static(b"data"), "video/webm");
        let url = store.create(&blob);
        assert!(url.as_str().starts_with(URL_PREFIX));
        assert_eq!(store.resolve(&url), Some(blob));
        assert_eq!(store.live_count(), 1);

        assert!(store.revoke(&url));
        assert!(!store.revoke(&url));
        assert!(store.resolve(&url).is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_urls_are_unique() {
        let store = ObjectUrlStore::new();
        let blob = Blob::new(Bytes::from_static(b"x"), "video/mp4");
        let a = store.create(&blob);
        let b = store.create(&blob);
        assert_ne!(a, b);
        assert_eq!(store.revoke_all(), 2);
    }
}
