//! Converting encrypted downloads with the external `um` decryptor.

mod ncm;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LibrarySettings;
use crate::library::{audio_files, collect_files};
use crate::staging::ImportLedger;
use crate::tags::TagStore;
use crate::tools::{CommandRunner, ToolOutcome, display_command, find_decryptor, input_arg};

pub const ENCRYPTED_EXTENSION: &str = "ncm";

const SUCCESS_MARKER: &str = "successfully converted";
/// Diagnostics the decryptor prints even though the file was converted.
const TOLERATED_MARKERS: [&str; 4] = [
    "no suitable decoder",
    "skipping while no suitable decoder",
    "xm magic header not matched",
    "run app failed",
];

#[derive(Debug, Error)]
pub enum DecryptorError {
    #[error("decryptor `um` not found")]
    Missing,
    #[error("decryptor {0} is an empty file")]
    Empty(PathBuf),
}

/// Locate a usable decryptor executable.
pub fn locate_decryptor(
    project_root: &Path,
    explicit: Option<&Path>,
) -> Result<PathBuf, DecryptorError> {
    let path = find_decryptor(project_root, explicit).ok_or(DecryptorError::Missing)?;
    match fs::metadata(&path) {
        Ok(m) if m.len() > 0 => Ok(path),
        _ => Err(DecryptorError::Empty(path)),
    }
}

pub fn is_encrypted(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ENCRYPTED_EXTENSION))
}

/// Exit 0, or a failing exit whose output still reports the conversion next
/// to a known harmless diagnostic.
pub fn conversion_succeeded(outcome: &ToolOutcome) -> bool {
    match outcome {
        ToolOutcome::Exited { code: Some(0), .. } => true,
        ToolOutcome::Exited { .. } => {
            let text = outcome.combined_text().to_lowercase();
            text.contains(SUCCESS_MARKER) && TOLERATED_MARKERS.iter().any(|m| text.contains(m))
        }
        _ => false,
    }
}

/// Program and arguments to launch `program`, going through the shell for
/// script shims on Windows.
pub fn invocation(program: &Path, args: Vec<OsString>) -> (PathBuf, Vec<OsString>) {
    let ext = program
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let mut wrapped: Vec<OsString> = match ext.as_deref() {
        Some("cmd" | "bat") if cfg!(windows) => vec!["/c".into()],
        Some("ps1") if cfg!(windows) => ["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]
            .map(OsString::from)
            .to_vec(),
        _ => return (program.to_path_buf(), args),
    };
    let shell = if wrapped.len() == 1 { "cmd" } else { "powershell" };
    wrapped.push(program.as_os_str().to_os_string());
    wrapped.extend(args);
    (PathBuf::from(shell), wrapped)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecryptStats {
    pub converted: usize,
    /// Converted on an earlier run.
    pub present: usize,
    pub failed: usize,
    pub covers_embedded: usize,
}

pub struct Decryptor<'a> {
    program: PathBuf,
    runner: &'a dyn CommandRunner,
    tags: &'a dyn TagStore,
    library: &'a LibrarySettings,
    timeout: Duration,
    dry_run: bool,
}

impl<'a> Decryptor<'a> {
    pub fn new(
        program: PathBuf,
        runner: &'a dyn CommandRunner,
        tags: &'a dyn TagStore,
        library: &'a LibrarySettings,
        timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            program,
            runner,
            tags,
            library,
            timeout,
            dry_run,
        }
    }

    /// Convert every encrypted file under `src_root` into the mirrored
    /// directory under `out_root`.
    pub fn decrypt_tree(
        &self,
        src_root: &Path,
        out_root: &Path,
        ledger: &mut ImportLedger,
    ) -> DecryptStats {
        let mut stats = DecryptStats::default();
        for src in collect_files(src_root, self.library, is_encrypted) {
            let Ok(rel) = src.strip_prefix(src_root) else {
                continue;
            };
            let size = fs::metadata(&src).map(|m| m.len()).unwrap_or(0);
            if ledger.is_imported(rel, size) {
                debug!("already decrypted: {}", rel.display());
                stats.present += 1;
                continue;
            }
            let out_dir = match rel.parent() {
                Some(parent) => out_root.join(parent),
                None => out_root.to_path_buf(),
            };
            info!("DECRYPT {} -> {}", src.display(), out_dir.display());
            if self.dry_run {
                stats.converted += 1;
                continue;
            }

            match self.convert(&src, &out_dir) {
                Some(produced) => {
                    stats.converted += 1;
                    ledger.record(rel, size);
                    if self.embed_container_cover(&src, &produced) {
                        stats.covers_embedded += 1;
                    }
                }
                None => stats.failed += 1,
            }
        }
        stats
    }

    /// Run the decryptor for one file. Returns the produced audio file.
    fn convert(&self, src: &Path, out_dir: &Path) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(out_dir) {
            warn!("cannot create {}: {e}", out_dir.display());
            return None;
        }
        let before: BTreeSet<PathBuf> = audio_files(out_dir, self.library).into_iter().collect();

        let args = vec!["-o".into(), input_arg(out_dir), input_arg(src)];
        let (program, args) = invocation(&self.program, args);
        debug!("cmd: {}", display_command(&program, &args));
        let outcome = self.runner.run(&program, &args, Some(self.timeout));
        if !conversion_succeeded(&outcome) {
            warn!("decryption failed for {}: {}", src.display(), outcome.combined_text());
            return None;
        }
        if !outcome.success() {
            info!("decryptor reported problems but converted {}", src.display());
        }

        let produced = self.locate_output(src, out_dir, &before);
        if produced.is_none() {
            warn!("decrypted output of {} not found in {}", src.display(), out_dir.display());
        }
        produced
    }

    /// Same-stem file, else a newly appeared file, else the newest one.
    fn locate_output(
        &self,
        src: &Path,
        out_dir: &Path,
        before: &BTreeSet<PathBuf>,
    ) -> Option<PathBuf> {
        let after = audio_files(out_dir, self.library);
        let stem = src.file_stem()?;
        after
            .iter()
            .find(|p| p.parent() == Some(out_dir) && p.file_stem() == Some(stem))
            .or_else(|| after.iter().find(|p| !before.contains(*p)))
            .or_else(|| {
                after
                    .iter()
                    .filter_map(|p| Some((fs::metadata(p).ok()?.modified().ok()?, p)))
                    .max_by_key(|(mtime, _)| *mtime)
                    .map(|(_, p)| p)
            })
            .cloned()
    }

    /// Copy the container's cover into `produced` unless it already has one.
    fn embed_container_cover(&self, src: &Path, produced: &Path) -> bool {
        if self.tags.has_embedded_cover(produced) {
            return false;
        }
        let Some(image) = ncm::read_cover_file(src) else {
            debug!("no cover in {}", src.display());
            return false;
        };
        match self.tags.write_cover(produced, &image) {
            Ok(()) => {
                info!("COVER embedded from {} into {}", src.display(), produced.display());
                true
            }
            Err(e) => {
                warn!("failed to embed cover into {}: {e}", produced.display());
                false
            }
        }
    }
}
