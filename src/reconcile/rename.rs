use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::LibrarySettings;
use crate::fingerprint::{FingerprintCache, same_content};
use crate::tags::TagStore;

use super::{ConflictPolicy, ReconcileStats, RenameOutcome};

/// Owns the per-run fingerprint memo and counters for all path mutations.
pub struct Reconciler<'a> {
    pub(super) tags: &'a dyn TagStore,
    pub(super) library: &'a LibrarySettings,
    pub(super) policy: ConflictPolicy,
    pub(super) dry_run: bool,
    fingerprints: FingerprintCache,
    pub(super) stats: ReconcileStats,
}

/// Absolute, symlink-free form of `path`, also for paths that do not exist yet.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

pub(crate) fn same_path(a: &Path, b: &Path) -> bool {
    a == b || normalize_path(a) == normalize_path(b)
}

/// First free `{stem}__{n}{.ext}` sibling of `dst`.
fn suffixed_free_path(dst: &Path) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dst
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1u32..)
        .map(|i| dst.with_file_name(format!("{stem}__{i}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dst.to_path_buf())
}

impl<'a> Reconciler<'a> {
    pub fn new(
        tags: &'a dyn TagStore,
        library: &'a LibrarySettings,
        policy: ConflictPolicy,
        dry_run: bool,
    ) -> Self {
        Self {
            tags,
            library,
            policy,
            dry_run,
            fingerprints: FingerprintCache::new(),
            stats: ReconcileStats::default(),
        }
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Whether two existing files carry the same audio.
    pub(super) fn identical(&mut self, a: &Path, b: &Path) -> bool {
        if !a.is_file() || !b.is_file() {
            return false;
        }
        let fa = self.fingerprints.get(a);
        let fb = self.fingerprints.get(b);
        same_content(fa.as_ref(), fb.as_ref())
    }

    /// Delete `path` as a confirmed duplicate of `canonical`.
    pub(super) fn remove_duplicate(&mut self, path: &Path, canonical: &Path) -> bool {
        info!(
            "DEDUP {} duplicates {}, removing it",
            path.display(),
            canonical.display()
        );
        if !self.dry_run {
            if let Err(e) = fs::remove_file(path) {
                warn!("failed to remove duplicate {}: {e}", path.display());
                return false;
            }
            self.fingerprints.forget(path);
        }
        self.stats.deduplicated += 1;
        true
    }

    /// Move `src` to `dst` under `policy`.
    ///
    /// Never overwrites: an existing `dst` either proves to be the same audio
    /// (and `src` is deleted) or the move is skipped, unless `policy` asks for
    /// a disambiguating suffix.
    pub fn rename(&mut self, src: &Path, dst: &Path, policy: ConflictPolicy) -> RenameOutcome {
        if same_path(src, dst) {
            return RenameOutcome::Unchanged;
        }
        if !src.exists() {
            warn!("rename source vanished: {}", src.display());
            self.stats.skipped += 1;
            return RenameOutcome::Skipped;
        }

        let target = if dst.exists() {
            match policy {
                ConflictPolicy::Dedupe => {
                    if self.identical(src, dst) && self.remove_duplicate(src, dst) {
                        return RenameOutcome::Deduplicated;
                    }
                    info!("SKIP target exists with different content: {}", dst.display());
                    self.stats.skipped += 1;
                    return RenameOutcome::Skipped;
                }
                ConflictPolicy::Suffix => suffixed_free_path(dst),
            }
        } else {
            dst.to_path_buf()
        };

        info!("RENAME {} -> {}", src.display(), target.display());
        if !self.dry_run {
            if let Err(e) = fs::rename(src, &target) {
                warn!("rename failed {}: {e}", src.display());
                self.stats.skipped += 1;
                return RenameOutcome::Skipped;
            }
            self.fingerprints.forget(src);
        }
        self.stats.moved += 1;
        RenameOutcome::Moved(target)
    }

    /// Create `dir` (and parents) unless it exists.
    pub(super) fn ensure_dir(&mut self, dir: &Path) -> bool {
        if dir.is_dir() {
            return true;
        }
        info!("MKDIR {}", dir.display());
        self.stats.created_dirs += 1;
        if self.dry_run {
            return true;
        }
        match fs::create_dir_all(dir) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to create {}: {e}", dir.display());
                false
            }
        }
    }
}
