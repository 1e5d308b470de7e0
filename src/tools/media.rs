use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ToolSettings;

use super::process::{CommandRunner, ToolOutcome, display_command};
use super::ToolError;

/// Artifacts smaller than this are treated as truncated without probing.
pub const MIN_ARTIFACT_BYTES: u64 = 1024;
/// Minimum container duration (seconds) for a usable artifact.
pub const MIN_ARTIFACT_SECS: f64 = 0.1;

/// Resolved `ffmpeg`/`ffprobe` locations.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Encoding/probing tool facade shared by the cover resolver and synthesizer.
pub struct MediaTools<'a> {
    paths: ToolPaths,
    runner: &'a dyn CommandRunner,
    probe_timeout: Duration,
    decode_timeout: Duration,
    repair_timeout: Duration,
}

/// Stream summary of a container, from `ffprobe` JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerReport {
    pub has_audio: bool,
    pub has_video: bool,
    pub duration: Option<f64>,
}

impl ContainerReport {
    pub fn is_playable(&self) -> bool {
        self.has_audio && self.has_video && self.duration.is_some_and(|d| d > MIN_ARTIFACT_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json` output into a report.
pub fn parse_container_report(json: &[u8]) -> Option<ContainerReport> {
    let parsed: ProbeOutput = serde_json::from_slice(json).ok()?;
    let has_type = |t: &str| parsed.streams.iter().any(|s| s.codec_type.as_deref() == Some(t));
    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok());
    Some(ContainerReport {
        has_audio: has_type("audio"),
        has_video: has_type("video"),
        duration,
    })
}

fn arg(s: impl Into<OsString>) -> OsString {
    s.into()
}

impl<'a> MediaTools<'a> {
    pub fn new(paths: ToolPaths, runner: &'a dyn CommandRunner, settings: &ToolSettings) -> Self {
        Self {
            paths,
            runner,
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
            decode_timeout: Duration::from_secs(settings.decode_timeout_secs),
            repair_timeout: Duration::from_secs(settings.repair_timeout_secs),
        }
    }

    fn ffmpeg(&self, args: &[OsString], timeout: Duration) -> ToolOutcome {
        debug!("cmd: {}", display_command(&self.paths.ffmpeg, args));
        self.runner.run(&self.paths.ffmpeg, args, Some(timeout))
    }

    fn ffprobe(&self, args: &[OsString]) -> ToolOutcome {
        debug!("cmd: {}", display_command(&self.paths.ffprobe, args));
        self.runner.run(&self.paths.ffprobe, args, Some(self.probe_timeout))
    }

    /// Whether the decoder can fully read the image.
    pub fn is_image_decodable(&self, image: &Path) -> bool {
        let non_empty = fs::metadata(image).map(|m| m.len() > 0).unwrap_or(false);
        if !non_empty {
            return false;
        }
        let args = vec![
            arg("-v"),
            arg("error"),
            arg("-i"),
            input_arg(image),
            arg("-f"),
            arg("null"),
            arg("-"),
        ];
        self.ffmpeg(&args, self.decode_timeout).success()
    }

    /// Codec name of the first video stream (`mjpeg`, `png`, ...).
    pub fn probe_image_codec(&self, image: &Path) -> Option<String> {
        let args = vec![
            arg("-v"),
            arg("error"),
            arg("-select_streams"),
            arg("v:0"),
            arg("-show_entries"),
            arg("stream=codec_name"),
            arg("-of"),
            arg("default=nw=1:nk=1"),
            input_arg(image),
        ];
        let outcome = self.ffprobe(&args);
        if !outcome.success() {
            return None;
        }
        let codec = String::from_utf8_lossy(outcome.stdout()).trim().to_lowercase();
        (!codec.is_empty()).then_some(codec)
    }

    /// Re-encode `image` as a fresh JPEG and replace it in place.
    pub fn reencode_image(&self, image: &Path) -> Result<(), ToolError> {
        let fixed = image.with_file_name("Cover_fixed.jpg");
        let args = vec![
            arg("-y"),
            arg("-i"),
            input_arg(image),
            arg("-q:v"),
            arg("2"),
            input_arg(&fixed),
        ];
        let outcome = self.ffmpeg(&args, self.repair_timeout);
        let produced = fs::metadata(&fixed).map(|m| m.len() > 0).unwrap_or(false);
        if !outcome.success() || !produced {
            let _ = fs::remove_file(&fixed);
            return Err(ToolError::from_outcome("ffmpeg", &outcome));
        }
        fs::remove_file(image)?;
        fs::rename(&fixed, image)?;
        Ok(())
    }

    /// Probe a container's streams and duration.
    pub fn probe_container(&self, path: &Path) -> Option<ContainerReport> {
        let args = vec![
            arg("-v"),
            arg("error"),
            arg("-print_format"),
            arg("json"),
            arg("-show_entries"),
            arg("format=duration"),
            arg("-show_entries"),
            arg("stream=codec_type"),
            input_arg(path),
        ];
        let outcome = self.ffprobe(&args);
        if !outcome.success() || outcome.stdout().is_empty() {
            return None;
        }
        parse_container_report(outcome.stdout())
    }

    /// Integrity check for a rendered artifact: parses, has audio and video,
    /// and lasts longer than [`MIN_ARTIFACT_SECS`].
    pub fn is_artifact_valid(&self, path: &Path) -> bool {
        let big_enough = fs::metadata(path)
            .map(|m| m.is_file() && m.len() >= MIN_ARTIFACT_BYTES)
            .unwrap_or(false);
        if !big_enough {
            return false;
        }
        match self.probe_container(path) {
            Some(report) => report.is_playable(),
            None => {
                warn!("probe failed for {}", path.display());
                false
            }
        }
    }

    /// Run `ffmpeg` with caller-built arguments (used for encoding).
    pub fn run_ffmpeg(&self, args: &[OsString], timeout: Duration) -> ToolOutcome {
        self.ffmpeg(args, timeout)
    }
}

/// Path argument for tool input/output. Windows gets the long-path prefix so
/// non-ASCII and deep paths survive.
pub fn input_arg(path: &Path) -> OsString {
    if cfg!(windows) {
        if let Ok(abs) = std::path::absolute(path) {
            let mut s = OsString::from(r"\\?\");
            s.push(abs.as_os_str());
            return s;
        }
    }
    path.as_os_str().to_os_string()
}
