use tracing::info;

use crate::cleanup::CleanupStats;
use crate::decrypt::DecryptStats;
use crate::lyrics::AlignStats;
use crate::reconcile::ReconcileStats;
use crate::staging::StageStats;
use crate::synth::SynthOutcome;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VideoStats {
    pub generated: usize,
    pub reused: usize,
    pub failed: usize,
}

impl VideoStats {
    pub fn record(&mut self, outcome: SynthOutcome) {
        match outcome {
            SynthOutcome::AlreadyValid => self.reused += 1,
            SynthOutcome::Generated { .. } => self.generated += 1,
            SynthOutcome::Failed => self.failed += 1,
        }
    }
}

/// Counters of one run, logged at the end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub decrypt: DecryptStats,
    pub staged: StageStats,
    pub reconcile: ReconcileStats,
    pub lyrics: AlignStats,
    pub covers_resolved: usize,
    pub covers_unresolved: usize,
    pub videos: VideoStats,
    pub cleanup: CleanupStats,
}

impl RunSummary {
    /// Whether anything went wrong that a rerun might fix.
    pub fn has_failures(&self) -> bool {
        self.decrypt.failed + self.staged.failed + self.videos.failed > 0
    }

    pub fn log(&self, dry_run: bool) {
        let prefix = if dry_run { "[dry run] " } else { "" };
        let d = &self.decrypt;
        info!(
            "{prefix}decrypted {} ({} earlier, {} failed, {} covers embedded)",
            d.converted, d.present, d.failed, d.covers_embedded
        );
        let s = &self.staged;
        info!(
            "{prefix}staged {} ({} present, {} conflicts, {} failed)",
            s.copied, s.present, s.conflicts, s.failed
        );
        let r = &self.reconcile;
        info!(
            "{prefix}moved {}, deduplicated {}, skipped {}, created {} directories",
            r.moved, r.deduplicated, r.skipped, r.created_dirs
        );
        if r.unnumbered > 0 {
            info!("{prefix}{} tracks without a track number", r.unnumbered);
        }
        info!(
            "{prefix}lyrics bound {}, unmatched {}",
            self.lyrics.bound, self.lyrics.unmatched
        );
        info!(
            "{prefix}covers resolved {}, unresolved {}",
            self.covers_resolved, self.covers_unresolved
        );
        let v = &self.videos;
        info!(
            "{prefix}videos generated {}, reused {}, failed {}",
            v.generated, v.reused, v.failed
        );
        if self.cleanup != CleanupStats::default() {
            info!(
                "{prefix}removed {} files and {} directories",
                self.cleanup.removed_files, self.cleanup.removed_dirs
            );
        }
    }
}
