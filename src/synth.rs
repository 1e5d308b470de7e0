//! Rendering one video per track: the album cover looped over the track's
//! audio, with the aligned lyrics burned in when they can be.
//!
//! The output path only ever holds a validated artifact. Failed or
//! unvalidated attempts are removed before [`Synthesizer::synthesize`]
//! returns.

mod encode;
mod subtitles;


use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::SynthSettings;
use crate::tools::{MediaTools, ToolError};

use encode::{EncodeJob, encode_args, encoder_plan};
use subtitles::{safe_copy, write_srt};

/// One track to render.
#[derive(Debug, Clone, Copy)]
pub struct SynthRequest<'p> {
    pub cover: &'p Path,
    pub audio: &'p Path,
    pub lyric: Option<&'p Path>,
    pub output: &'p Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthOutcome {
    /// A valid artifact was already in place.
    AlreadyValid,
    Generated { subtitles: bool },
    Failed,
}

/// Why one render attempt produced nothing usable.
#[derive(Debug)]
enum AttemptError {
    /// Every encoder timed out.
    Timeout,
    /// The encoder exited with an error.
    Tool(ToolError),
    /// The encoder claimed success but the output did not validate.
    Invalid,
}

pub struct Synthesizer<'a> {
    media: &'a MediaTools<'a>,
    settings: &'a SynthSettings,
    dry_run: bool,
}

impl<'a> Synthesizer<'a> {
    pub fn new(media: &'a MediaTools<'a>, settings: &'a SynthSettings, dry_run: bool) -> Self {
        Self {
            media,
            settings,
            dry_run,
        }
    }

    pub fn synthesize(
        &self,
        req: &SynthRequest<'_>,
        use_accelerated: bool,
        overwrite: bool,
    ) -> SynthOutcome {
        if req.output.exists() {
            if !overwrite && self.media.is_artifact_valid(req.output) {
                info!("VIDEO exists: {}", req.output.display());
                return SynthOutcome::AlreadyValid;
            }
            info!("VIDEO replacing {}", req.output.display());
            if !self.dry_run && !self.discard(req.output) {
                return SynthOutcome::Failed;
            }
        }
        if self.dry_run {
            info!("VIDEO would render {}", req.output.display());
            return SynthOutcome::Generated {
                subtitles: req.lyric.is_some(),
            };
        }

        let srt = req.lyric.and_then(write_srt);
        let outcome = match srt.as_deref() {
            Some(srt) => self.render_with_subtitles(req, srt, use_accelerated),
            None => self.render_plain(req, use_accelerated),
        };
        if let (Some(srt), SynthOutcome::Generated { .. }) = (&srt, outcome) {
            let _ = fs::remove_file(srt);
        }
        outcome
    }

    /// Subtitles from their own path, then from a sanitized copy, then none.
    fn render_with_subtitles(
        &self,
        req: &SynthRequest<'_>,
        srt: &Path,
        use_accelerated: bool,
    ) -> SynthOutcome {
        match self.attempt(req, Some(srt), use_accelerated) {
            Ok(()) => return self.generated(req, true),
            Err(AttemptError::Timeout) => {
                warn!("subtitled render of {} timed out", req.audio.display());
            }
            Err(AttemptError::Invalid) => {}
            Err(AttemptError::Tool(e)) => {
                warn!("subtitle burn-in failed for {}: {e}", req.audio.display());
                if let Some(copy) = safe_copy(srt) {
                    let result = self.attempt(req, Some(&copy), use_accelerated);
                    let _ = fs::remove_file(&copy);
                    if result.is_ok() {
                        return self.generated(req, true);
                    }
                }
            }
        }
        warn!("retrying {} without subtitles", req.audio.display());
        self.render_plain(req, use_accelerated)
    }

    fn render_plain(&self, req: &SynthRequest<'_>, use_accelerated: bool) -> SynthOutcome {
        match self.attempt(req, None, use_accelerated) {
            Ok(()) => self.generated(req, false),
            Err(AttemptError::Timeout) => self.failed(req, "encoder timed out"),
            Err(AttemptError::Invalid) => self.failed(req, "output failed validation"),
            Err(AttemptError::Tool(e)) => self.failed(req, &e.to_string()),
        }
    }

    /// Run the encoder ladder once, then validate the output.
    fn attempt(
        &self,
        req: &SynthRequest<'_>,
        subtitles: Option<&Path>,
        use_accelerated: bool,
    ) -> Result<(), AttemptError> {
        let timeout = Duration::from_secs(self.settings.encode_timeout_secs);
        for (codec, attempts) in encoder_plan(self.settings, use_accelerated) {
            for n in 1..=attempts {
                let job = EncodeJob {
                    cover: req.cover,
                    audio: req.audio,
                    output: req.output,
                    subtitles,
                    video_codec: codec,
                };
                let outcome = self.media.run_ffmpeg(&encode_args(&job, self.settings), timeout);
                if outcome.success() {
                    if self.media.is_artifact_valid(req.output) {
                        return Ok(());
                    }
                    self.discard(req.output);
                    return Err(AttemptError::Invalid);
                }
                self.discard(req.output);
                if !outcome.is_timeout() {
                    return Err(AttemptError::Tool(ToolError::from_outcome("ffmpeg", &outcome)));
                }
                warn!("{codec} timed out on {} (attempt {n}/{attempts})", req.audio.display());
            }
        }
        Err(AttemptError::Timeout)
    }

    fn generated(&self, req: &SynthRequest<'_>, subtitles: bool) -> SynthOutcome {
        info!("VIDEO {} -> {}", req.audio.display(), req.output.display());
        SynthOutcome::Generated { subtitles }
    }

    fn failed(&self, req: &SynthRequest<'_>, reason: &str) -> SynthOutcome {
        warn!("VIDEO failed for {}: {reason}", req.audio.display());
        SynthOutcome::Failed
    }

    /// Remove a partial or stale artifact. False when it is still there.
    fn discard(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("cannot remove {}: {e}", path.display());
                false
            }
        }
    }
}

/// Artifact path for `audio`: same stem, video extension.
pub fn video_path_for(audio: &Path) -> PathBuf {
    audio.with_extension(crate::library::VIDEO_EXTENSION)
}
