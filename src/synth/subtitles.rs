use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::lyrics::lrc::{decode_lyric_bytes, parse_lines, to_srt};

const TEMP_DIR_NAME: &str = "albumkit_subtitles";
const CWD_TEMP_DIR_NAME: &str = "__subtitles_tmp";

/// Escape a path for use inside a quoted filtergraph option.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Convert `lyric` to a `.srt` beside it. `None` when the lyric has no timed
/// lines or the file cannot be written.
pub fn write_srt(lyric: &Path) -> Option<PathBuf> {
    let bytes = match fs::read(lyric) {
        Ok(b) => b,
        Err(e) => {
            warn!("cannot read {}: {e}", lyric.display());
            return None;
        }
    };
    let Some(srt) = to_srt(&parse_lines(&decode_lyric_bytes(&bytes))) else {
        debug!("no timed lines in {}", lyric.display());
        return None;
    };
    let target = lyric.with_extension("srt");
    match fs::write(&target, srt) {
        Ok(()) => Some(target),
        Err(e) => {
            warn!("cannot write {}: {e}", target.display());
            None
        }
    }
}

/// ASCII-only file name for a temporary copy of `srt`.
pub fn safe_copy_name(srt: &Path) -> String {
    let digest = blake3::hash(srt.as_os_str().as_encoded_bytes()).to_hex();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("__sub_{}_{}_{nanos}.srt", &digest.as_str()[..8], process::id())
}

/// Copy `srt` to a path free of characters the subtitle filter chokes on.
/// The system temp directory is tried first, then the working directory.
pub fn safe_copy(srt: &Path) -> Option<PathBuf> {
    let name = safe_copy_name(srt);
    let mut dirs = vec![env::temp_dir().join(TEMP_DIR_NAME)];
    if let Ok(cwd) = env::current_dir() {
        dirs.push(cwd.join(CWD_TEMP_DIR_NAME));
    }
    for dir in dirs {
        let target = dir.join(&name);
        if fs::create_dir_all(&dir).is_ok() && fs::copy(srt, &target).is_ok() {
            debug!("subtitle copy at {}", target.display());
            return Some(target);
        }
    }
    warn!("no safe location for a copy of {}", srt.display());
    None
}
