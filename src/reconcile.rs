//! Moving tracks into canonical album directories without ever losing audio.
//!
//! Every move goes through [`Reconciler::rename`], which refuses to overwrite
//! an existing file unless it can prove, by fingerprint, that the two files
//! carry the same audio.

mod organize;
mod rename;


use std::path::PathBuf;

pub use rename::Reconciler;

/// What to do when a rename target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Delete the source if its fingerprint matches the target, else skip.
    Dedupe,
    /// Append `__1`, `__2`, ... to the target stem until it is free.
    Suffix,
}

impl ConflictPolicy {
    pub fn from_force_rename(force: bool) -> Self {
        if force { Self::Suffix } else { Self::Dedupe }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// Source and target are the same file.
    Unchanged,
    /// The file now lives at the contained path.
    Moved(PathBuf),
    /// The source was a duplicate of the existing target and was removed.
    Deduplicated,
    /// The target holds different content (or the move failed); nothing changed.
    Skipped,
}

impl RenameOutcome {
    /// Whether the source path no longer holds the file afterwards.
    pub fn vacated_source(&self) -> bool {
        matches!(self, Self::Moved(_) | Self::Deduplicated)
    }
}

/// Counters reported in the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub moved: usize,
    pub deduplicated: usize,
    pub skipped: usize,
    pub created_dirs: usize,
    pub unnumbered: usize,
}

impl ReconcileStats {
    /// Moves plus deletions: zero on an already reconciled tree.
    pub fn mutations(&self) -> usize {
        self.moved + self.deduplicated + self.created_dirs
    }
}
