use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::tags::TagStore;

use super::model::Track;

/// Cover file names recognized in album directories, in lookup order.
pub const COVER_NAMES: [&str; 2] = ["Cover.jpg", "Cover.png"];

pub const LYRIC_EXTENSION: &str = "lrc";
pub const VIDEO_EXTENSION: &str = "mp4";

fn has_extension_in(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .any(|e| !e.is_empty() && e == ext)
        })
        .unwrap_or(false)
}

pub fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    has_extension_in(path, &settings.audio_extensions)
}

pub fn is_lyric_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(LYRIC_EXTENSION))
}

pub fn is_cover_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|n| COVER_NAMES.contains(&n))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// All regular files under `dir` matching `keep`, sorted by path.
///
/// The result is a fully materialized snapshot, so callers may move files
/// while iterating it.
pub fn collect_files(
    dir: &Path,
    settings: &LibrarySettings,
    keep: impl Fn(&Path) -> bool,
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(settings.follow_links)
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| keep(p.as_path()))
        .collect();
    files.sort();
    files
}

pub fn audio_files(dir: &Path, settings: &LibrarySettings) -> Vec<PathBuf> {
    collect_files(dir, settings, |p| is_audio_file(p, settings))
}

pub fn lyric_files(dir: &Path, settings: &LibrarySettings) -> Vec<PathBuf> {
    collect_files(dir, settings, is_lyric_file)
}

/// Audio files under `dir` with their tags.
pub fn scan_tracks(dir: &Path, settings: &LibrarySettings, tags: &dyn TagStore) -> Vec<Track> {
    audio_files(dir, settings)
        .into_iter()
        .map(|path| {
            let tags = tags.read(&path);
            Track { path, tags }
        })
        .collect()
}

/// Directories holding at least one track where no descendant directory
/// also holds one. Sorted case-insensitively.
pub fn find_leaf_album_dirs(root: &Path, settings: &LibrarySettings) -> Vec<PathBuf> {
    let track_dirs: BTreeSet<PathBuf> = audio_files(root, settings)
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();

    let mut leaves: Vec<PathBuf> = track_dirs
        .iter()
        .filter(|d| {
            !track_dirs
                .iter()
                .any(|other| other != *d && other.starts_with(d))
        })
        .cloned()
        .collect();
    leaves.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    leaves
}

/// The existing cover file of `dir`, `Cover.jpg` before `Cover.png`.
pub fn existing_cover(dir: &Path) -> Option<PathBuf> {
    COVER_NAMES
        .iter()
        .map(|n| dir.join(n))
        .find(|p| p.is_file())
}
