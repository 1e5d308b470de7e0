//! Final sweep of the output tree: only album directories and the files
//! belonging to them survive.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::LibrarySettings;
use crate::library::{
    VIDEO_EXTENSION, find_leaf_album_dirs, is_audio_file, is_cover_name, is_lyric_file,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub removed_files: usize,
    pub removed_dirs: usize,
}

struct Sweep<'a> {
    albums: BTreeSet<PathBuf>,
    settings: &'a LibrarySettings,
    dry_run: bool,
    stats: CleanupStats,
}

fn sorted_entries(dir: &Path) -> Vec<(PathBuf, bool)> {
    let Ok(entries) = fs::read_dir(dir) else {
        warn!("cannot list {}", dir.display());
        return Vec::new();
    };
    let mut out: Vec<(PathBuf, bool)> = entries
        .filter_map(Result::ok)
        .map(|e| {
            let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
            (e.path(), is_dir)
        })
        .collect();
    out.sort();
    out
}

impl Sweep<'_> {
    fn is_album_or_ancestor(&self, dir: &Path) -> bool {
        self.albums.iter().any(|a| a.starts_with(dir))
    }

    fn belongs_in_album(&self, file: &Path) -> bool {
        is_audio_file(file, self.settings)
            || is_lyric_file(file)
            || is_cover_name(file)
            || file
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(VIDEO_EXTENSION))
    }

    fn visit(&mut self, dir: &Path) {
        if self.albums.contains(dir) {
            self.clean_album(dir);
            return;
        }
        for (path, is_dir) in sorted_entries(dir) {
            if !is_dir {
                self.remove_file(&path);
            } else if self.is_album_or_ancestor(&path) {
                self.visit(&path);
            } else {
                self.remove_dir(&path);
            }
        }
    }

    fn clean_album(&mut self, dir: &Path) {
        for (path, is_dir) in sorted_entries(dir) {
            if is_dir {
                self.remove_dir(&path);
            } else if !self.belongs_in_album(&path) {
                self.remove_file(&path);
            }
        }
    }

    fn remove_file(&mut self, path: &Path) {
        info!("CLEAN {}", path.display());
        self.stats.removed_files += 1;
        if !self.dry_run {
            if let Err(e) = fs::remove_file(path) {
                warn!("cannot remove {}: {e}", path.display());
            }
        }
    }

    fn remove_dir(&mut self, path: &Path) {
        info!("CLEAN {}/", path.display());
        self.stats.removed_dirs += 1;
        if !self.dry_run {
            if let Err(e) = fs::remove_dir_all(path) {
                warn!("cannot remove {}: {e}", path.display());
            }
        }
    }
}

/// Remove everything under `root` that is neither an album directory, an
/// ancestor of one, nor a track, lyric, cover or video inside one.
pub fn clean_output(root: &Path, settings: &LibrarySettings, dry_run: bool) -> CleanupStats {
    let mut sweep = Sweep {
        albums: find_leaf_album_dirs(root, settings).into_iter().collect(),
        settings,
        dry_run,
        stats: CleanupStats::default(),
    };
    if sweep.albums.is_empty() {
        info!("no album directories under {}, nothing to clean", root.display());
        return sweep.stats;
    }
    sweep.visit(root);
    sweep.stats
}
