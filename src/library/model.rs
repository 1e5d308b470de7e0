use std::path::PathBuf;

use crate::tags::TrackTags;

/// An audio file and the tags read from it during the current snapshot.
#[derive(Debug, Clone)]
pub struct Track {
    pub path: PathBuf,
    pub tags: TrackTags,
}
