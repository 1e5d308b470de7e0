//! One run over a project root: import sources, reconcile the output tree,
//! resolve covers and render videos.

mod summary;


pub use summary::{RunSummary, VideoStats};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::config::Settings;
use crate::cover::{CoverOutcome, CoverProvider, CoverResolver, ImageFormat};
use crate::decrypt::Decryptor;
use crate::library::{
    LYRIC_EXTENSION, audio_files, collect_files, existing_cover, find_leaf_album_dirs,
};
use crate::lyrics::LyricAligner;
use crate::reconcile::{ConflictPolicy, Reconciler};
use crate::staging::{ImportLedger, stage_sources};
use crate::synth::{SynthRequest, Synthesizer, video_path_for};
use crate::tags::TagStore;
use crate::tools::{CommandRunner, MediaTools};
use crate::{cleanup, decrypt};

/// Sources live here, relative to the project root.
pub const SOURCE_DIR_NAME: &str = "res";
/// Copies of resolved covers for review, inside the output root.
pub const COVER_EXPORT_DIR_NAME: &str = "_covers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Import, reconcile, resolve covers, render and clean up.
    All,
    /// Everything up to cover resolution.
    Prepare,
    /// Render with the covers already in place.
    Render,
}

/// Run switches coming from the command line.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub stage: Stage,
    pub dry_run: bool,
    pub use_accelerated: bool,
    pub overwrite: bool,
    pub force_rename: bool,
    pub online_cover: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stage: Stage::All,
            dry_run: false,
            use_accelerated: true,
            overwrite: false,
            force_rename: false,
            online_cover: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
}

impl Layout {
    pub fn new(project_root: &Path, dist: &Path) -> Self {
        Self {
            source_root: project_root.join(SOURCE_DIR_NAME),
            output_root: project_root.join(dist),
        }
    }
}

/// Collaborators of a run, all injected.
pub struct Pipeline<'a> {
    pub settings: &'a Settings,
    pub options: RunOptions,
    pub tags: &'a dyn TagStore,
    pub runner: &'a dyn CommandRunner,
    pub media: &'a MediaTools<'a>,
    pub providers: &'a [Box<dyn CoverProvider>],
    /// `None` skips decryption.
    pub decryptor: Option<PathBuf>,
}

impl Pipeline<'_> {
    pub fn run(&self, layout: &Layout) -> RunSummary {
        let mut summary = RunSummary::default();
        if self.options.stage != Stage::Render {
            self.prepare_tree(layout, &mut summary);
        }

        let dirs = find_leaf_album_dirs(&layout.output_root, &self.settings.library);
        info!("{} album directories under {}", dirs.len(), layout.output_root.display());
        for dir in &dirs {
            match self.options.stage {
                Stage::All => {
                    if let Some(cover) = self.resolve_cover(dir, &mut summary) {
                        self.render_dir(dir, &cover, &mut summary);
                    }
                }
                Stage::Prepare => {
                    if let Some(cover) = self.resolve_cover(dir, &mut summary) {
                        self.export_cover(layout, dir, &cover);
                    }
                }
                Stage::Render => {
                    if let Some(cover) = self.existing_usable_cover(dir, &mut summary) {
                        self.render_dir(dir, &cover, &mut summary);
                    }
                }
            }
        }

        if self.options.stage == Stage::All {
            summary.cleanup = cleanup::clean_output(
                &layout.output_root,
                &self.settings.library,
                self.options.dry_run,
            );
        }
        summary
    }

    /// Import sources, then reorganize the output tree and bind lyrics.
    fn prepare_tree(&self, layout: &Layout, summary: &mut RunSummary) {
        let library = &self.settings.library;
        let dry_run = self.options.dry_run;
        let mut ledger = ImportLedger::load(&layout.source_root);

        if let Some(program) = &self.decryptor {
            let decryptor = Decryptor::new(
                program.clone(),
                self.runner,
                self.tags,
                library,
                Duration::from_secs(self.settings.tools.decrypt_timeout_secs),
                dry_run,
            );
            summary.decrypt =
                decryptor.decrypt_tree(&layout.source_root, &layout.output_root, &mut ledger);
        }
        summary.staged = stage_sources(
            &layout.source_root,
            &layout.output_root,
            library,
            &mut ledger,
            dry_run,
        );
        if !dry_run {
            if let Err(e) = ledger.save() {
                warn!("cannot save import ledger: {e}");
            }
        }

        if !layout.output_root.is_dir() {
            info!("nothing imported into {}", layout.output_root.display());
            return;
        }
        let policy = ConflictPolicy::from_force_rename(self.options.force_rename);
        let mut reconciler = Reconciler::new(self.tags, library, policy, dry_run);
        reconciler.reconcile(&layout.output_root);
        summary.lyrics =
            LyricAligner::new(self.tags, library).align(&layout.output_root, &mut reconciler);
        summary.reconcile = reconciler.stats();
    }

    fn resolve_cover(&self, dir: &Path, summary: &mut RunSummary) -> Option<PathBuf> {
        let online = self.settings.cover.online_fetch && self.options.online_cover;
        let resolver =
            CoverResolver::new(self.tags, self.media, self.providers, &self.settings.library);
        let outcome = resolver
            .with_online_fetch(online)
            .with_dry_run(self.options.dry_run)
            .resolve(dir);
        match outcome {
            CoverOutcome::Resolved { path, .. } => {
                summary.covers_resolved += 1;
                Some(path)
            }
            CoverOutcome::Unresolved(_) => {
                summary.covers_unresolved += 1;
                None
            }
        }
    }

    /// The cover already in `dir`, used as-is.
    fn existing_usable_cover(&self, dir: &Path, summary: &mut RunSummary) -> Option<PathBuf> {
        let usable = existing_cover(dir).filter(|c| self.media.is_image_decodable(c));
        match usable {
            Some(cover) => {
                summary.covers_resolved += 1;
                Some(cover)
            }
            None => {
                warn!("SKIP {}: missing or undecodable cover", dir.display());
                summary.covers_unresolved += 1;
                None
            }
        }
    }

    fn render_dir(&self, dir: &Path, cover: &Path, summary: &mut RunSummary) {
        let synth = Synthesizer::new(self.media, &self.settings.synth, self.options.dry_run);
        for audio in audio_files(dir, &self.settings.library) {
            let lyric = audio.with_extension(LYRIC_EXTENSION);
            let output = video_path_for(&audio);
            let req = SynthRequest {
                cover,
                audio: &audio,
                lyric: lyric.is_file().then_some(lyric.as_path()),
                output: &output,
            };
            let outcome =
                synth.synthesize(&req, self.options.use_accelerated, self.options.overwrite);
            summary.videos.record(outcome);
        }
    }

    /// Copy the resolved cover to `_covers/<album dir name>.<ext>`.
    fn export_cover(&self, layout: &Layout, dir: &Path, cover: &Path) {
        let Some(name) = dir.file_name() else {
            return;
        };
        let ext = ImageFormat::from_path(cover).unwrap_or(ImageFormat::Jpeg).extension();
        let export_dir = layout.output_root.join(COVER_EXPORT_DIR_NAME);
        let target = export_dir.join(format!("{}.{ext}", name.to_string_lossy()));
        info!("COVER export {} -> {}", cover.display(), target.display());
        if self.options.dry_run {
            return;
        }
        if let Err(e) = fs::create_dir_all(&export_dir).and_then(|()| fs::copy(cover, &target)) {
            warn!("cover export failed for {}: {e}", dir.display());
        }
    }
}

/// Whether the run has encrypted sources to convert.
pub fn needs_decryptor(layout: &Layout, settings: &Settings, options: &RunOptions) -> bool {
    options.stage != Stage::Render
        && !collect_files(&layout.source_root, &settings.library, decrypt::is_encrypted).is_empty()
}
