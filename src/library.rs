//! Library snapshots: which files are tracks, lyrics and covers, and which
//! directories count as album units.

mod model;
pub mod naming;
mod scan;

pub use model::Track;
pub use scan::{
    COVER_NAMES, LYRIC_EXTENSION, VIDEO_EXTENSION, audio_files, collect_files, existing_cover,
    find_leaf_album_dirs, is_audio_file, is_cover_name, is_lyric_file, lyric_files, scan_tracks,
};
