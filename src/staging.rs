//! Copying plain source files (tracks, covers and lyrics) into the output
//! tree, mirroring their relative paths.

mod ledger;

pub use ledger::ImportLedger;

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::LibrarySettings;
use crate::library::{collect_files, is_audio_file, is_cover_name, is_lyric_file};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub copied: usize,
    /// Already imported, or an equal-sized copy is in place.
    pub present: usize,
    /// A different file occupies the target.
    pub conflicts: usize,
    pub failed: usize,
}

pub fn is_stageable(path: &Path, settings: &LibrarySettings) -> bool {
    is_audio_file(path, settings) || is_cover_name(path) || is_lyric_file(path)
}

/// Copy every stageable file under `src_root` to the same relative path under
/// `out_root` unless it was imported before. Existing targets are never
/// overwritten.
pub fn stage_sources(
    src_root: &Path,
    out_root: &Path,
    settings: &LibrarySettings,
    ledger: &mut ImportLedger,
    dry_run: bool,
) -> StageStats {
    let mut stats = StageStats::default();
    let files = collect_files(src_root, settings, |p| {
        is_stageable(p, settings) && !p.starts_with(out_root)
    });

    for src in files {
        let Ok(rel) = src.strip_prefix(src_root) else {
            continue;
        };
        let size = match fs::metadata(&src) {
            Ok(m) => m.len(),
            Err(e) => {
                warn!("cannot stat {}: {e}", src.display());
                stats.failed += 1;
                continue;
            }
        };
        if ledger.is_imported(rel, size) {
            debug!("already imported: {}", rel.display());
            stats.present += 1;
            continue;
        }

        let target = out_root.join(rel);
        if let Ok(existing) = fs::metadata(&target) {
            if existing.len() == size {
                ledger.record(rel, size);
                stats.present += 1;
            } else {
                warn!("SKIP {} differs from the staged copy", target.display());
                stats.conflicts += 1;
            }
            continue;
        }

        info!("COPY {} -> {}", src.display(), target.display());
        if dry_run {
            stats.copied += 1;
            continue;
        }
        let copied = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::copy(&src, &target));
        match copied {
            Ok(_) => {
                ledger.record(rel, size);
                stats.copied += 1;
            }
            Err(e) => {
                warn!("copy failed for {}: {e}", src.display());
                stats.failed += 1;
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testing::snapshot;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let res = dir.path().join("res");
        let dist = dir.path().join("dist");
        fs::create_dir_all(res.join("Sam").join("Weather")).unwrap();
        fs::write(res.join("Sam").join("Weather").join("01 - Rain.mp3"), b"rain").unwrap();
        fs::write(res.join("Sam").join("Weather").join("01 - Rain.lrc"), b"[00:01.00]x").unwrap();
        fs::write(res.join("Sam").join("Weather").join("Cover.jpg"), b"jpeg").unwrap();
        fs::write(res.join("Sam").join("notes.txt"), b"ignored").unwrap();
        (dir, res, dist)
    }

    #[test]
    fn copies_tracks_lyrics_and_covers() {
        let (_dir, res, dist) = setup();
        let mut ledger = ImportLedger::load(&res);
        let settings = LibrarySettings::default();

        let stats = stage_sources(&res, &dist, &settings, &mut ledger, false);

        assert_eq!(stats.copied, 3);
        let album = dist.join("Sam").join("Weather");
        assert_eq!(fs::read(album.join("01 - Rain.mp3")).unwrap(), b"rain");
        assert!(album.join("01 - Rain.lrc").exists());
        assert!(album.join("Cover.jpg").exists());
        assert!(!dist.join("Sam").join("notes.txt").exists());
    }

    #[test]
    fn existing_targets_are_never_overwritten() {
        let (_dir, res, dist) = setup();
        let album = dist.join("Sam").join("Weather");
        fs::create_dir_all(&album).unwrap();
        fs::write(album.join("01 - Rain.mp3"), b"same").unwrap();
        fs::write(album.join("Cover.jpg"), b"a much larger cover").unwrap();
        let mut ledger = ImportLedger::load(&res);
        let settings = LibrarySettings::default();

        let stats = stage_sources(&res, &dist, &settings, &mut ledger, false);

        assert_eq!(stats.present, 1);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.copied, 1);
        assert_eq!(fs::read(album.join("01 - Rain.mp3")).unwrap(), b"same");
        assert_eq!(fs::read(album.join("Cover.jpg")).unwrap(), b"a much larger cover");
    }

    #[test]
    fn ledger_keeps_moved_files_from_returning() {
        let (_dir, res, dist) = setup();
        let settings = LibrarySettings::default();
        let mut ledger = ImportLedger::load(&res);
        stage_sources(&res, &dist, &settings, &mut ledger, false);
        ledger.save().unwrap();

        fs::remove_dir_all(dist.join("Sam")).unwrap();
        let mut reloaded = ImportLedger::load(&res);
        let stats = stage_sources(&res, &dist, &settings, &mut reloaded, false);

        assert_eq!(stats.copied, 0);
        assert_eq!(stats.present, 3);
        assert!(!dist.join("Sam").exists());
    }

    #[test]
    fn changed_source_is_imported_again() {
        let (_dir, res, dist) = setup();
        let settings = LibrarySettings::default();
        let mut ledger = ImportLedger::load(&res);
        stage_sources(&res, &dist, &settings, &mut ledger, false);
        fs::remove_dir_all(&dist).unwrap();
        let lyric = res.join("Sam").join("Weather").join("01 - Rain.lrc");
        fs::write(lyric, b"[00:01.00]longer").unwrap();

        let stats = stage_sources(&res, &dist, &settings, &mut ledger, false);
        assert_eq!(stats.copied, 1);
    }

    #[test]
    fn dry_run_copies_nothing() {
        let (dir, res, dist) = setup();
        let before = snapshot(dir.path());
        let mut ledger = ImportLedger::load(&res);

        let stats = stage_sources(&res, &dist, &LibrarySettings::default(), &mut ledger, true);

        assert_eq!(stats.copied, 3);
        assert_eq!(snapshot(dir.path()), before);
    }
}
