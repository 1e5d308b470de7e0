//! Tag access behind a small trait so the pipeline can run against the real
//! tag library or an in-memory stand-in.

mod store;

pub use store::LoftyTagStore;

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    /// lofty open/read/write failures.
    #[error("{0}")]
    Io(String),
    /// The file's format cannot carry the requested tag.
    #[error("{0}")]
    Unsupported(String),
}

/// The four tag fields the pipeline cares about. Empty values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track: Option<String>,
    pub title: Option<String>,
}

impl TrackTags {
    pub fn artist_or_empty(&self) -> &str {
        self.artist.as_deref().unwrap_or("")
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// Trimmed, non-empty value or `None`.
pub(crate) fn clean_value(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Read/write access to text tags and the embedded cover slot.
///
/// Reads never fail: unreadable files yield empty tags and no cover.
pub trait TagStore {
    fn read(&self, path: &Path) -> TrackTags;

    /// Raw bytes of the embedded cover (front cover preferred).
    fn embedded_cover(&self, path: &Path) -> Option<Vec<u8>>;

    fn has_embedded_cover(&self, path: &Path) -> bool {
        self.embedded_cover(path).is_some_and(|d| !d.is_empty())
    }

    /// Replace the embedded front cover with `image`.
    fn write_cover(&self, path: &Path, image: &[u8]) -> Result<(), TagError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory tag store keyed by file content, so entries follow files
    //! across renames.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    use super::{TagError, TagStore, TrackTags};

    #[derive(Default)]
    pub struct MemoryTags {
        tags: RefCell<HashMap<Vec<u8>, TrackTags>>,
        covers: RefCell<HashMap<Vec<u8>, Vec<u8>>>,
        fail_cover_writes: bool,
    }

    pub fn tags(artist: &str, album: &str, track: &str, title: &str) -> TrackTags {
        let v = |s: &str| (!s.is_empty()).then(|| s.to_string());
        TrackTags {
            artist: v(artist),
            album: v(album),
            track: v(track),
            title: v(title),
        }
    }

    impl MemoryTags {
        pub fn new() -> Self {
            Self::default()
        }

        /// A store whose cover writes always fail.
        pub fn refusing_cover_writes() -> Self {
            Self {
                fail_cover_writes: true,
                ..Self::default()
            }
        }

        /// Write `content` to `path` and register `tags` for it.
        pub fn add(&self, path: &Path, content: &[u8], tags: TrackTags) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
            self.tags.borrow_mut().insert(content.to_vec(), tags);
        }

        pub fn set_cover(&self, content: &[u8], image: &[u8]) {
            self.covers
                .borrow_mut()
                .insert(content.to_vec(), image.to_vec());
        }

        pub fn cover_for(&self, path: &Path) -> Option<Vec<u8>> {
            self.embedded_cover(path)
        }
    }

    impl TagStore for MemoryTags {
        fn read(&self, path: &Path) -> TrackTags {
            fs::read(path)
                .ok()
                .and_then(|c| self.tags.borrow().get(&c).cloned())
                .unwrap_or_default()
        }

        fn embedded_cover(&self, path: &Path) -> Option<Vec<u8>> {
            let content = fs::read(path).ok()?;
            self.covers.borrow().get(&content).cloned()
        }

        fn write_cover(&self, path: &Path, image: &[u8]) -> Result<(), TagError> {
            if self.fail_cover_writes {
                return Err(TagError::Io("write refused".to_string()));
            }
            let content = fs::read(path).map_err(|e| TagError::Io(e.to_string()))?;
            self.covers.borrow_mut().insert(content, image.to_vec());
            Ok(())
        }
    }
}
