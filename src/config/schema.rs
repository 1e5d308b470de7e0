use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/albumkit/config.toml` or
/// `~/.config/albumkit/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `ALBUMKIT__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub tools: ToolSettings,
    pub synth: SynthSettings,
    pub cover: CoverSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub audio_extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            audio_extensions: vec!["mp3".into(), "flac".into(), "m4a".into(), "wav".into()],
            follow_links: false,
            include_hidden: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Explicit `ffmpeg` location. Searched on `PATH` when unset.
    pub ffmpeg: Option<PathBuf>,
    /// Explicit `ffprobe` location. Searched on `PATH` when unset.
    pub ffprobe: Option<PathBuf>,
    /// Explicit decryptor (`um`) location.
    pub decryptor: Option<PathBuf>,
    /// Timeout for lightweight stream probes (seconds).
    pub probe_timeout_secs: u64,
    /// Timeout for image decode checks (seconds).
    pub decode_timeout_secs: u64,
    /// Timeout for the cover re-encode repair pass (seconds).
    pub repair_timeout_secs: u64,
    /// Timeout for one decryptor invocation (seconds).
    pub decrypt_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            ffprobe: None,
            decryptor: None,
            probe_timeout_secs: 10,
            decode_timeout_secs: 30,
            repair_timeout_secs: 60,
            decrypt_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SynthSettings {
    /// Timeout for a single encoder run (seconds).
    pub encode_timeout_secs: u64,
    /// Hardware encoder tried first when acceleration is enabled.
    pub accelerated_codec: String,
    /// Software encoder used without acceleration and as the timeout fallback.
    pub software_codec: String,
    /// Attempts with the hardware encoder before falling back on timeouts.
    pub accelerated_attempts: u32,
    /// Attempts with the software encoder, as fallback or as the only encoder.
    pub software_attempts: u32,
    /// Longer edge of the rendered video is capped at this many pixels.
    pub max_edge: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            encode_timeout_secs: 300,
            accelerated_codec: "h264_nvenc".to_string(),
            software_codec: "libx264".to_string(),
            accelerated_attempts: 1,
            software_attempts: 1,
            max_edge: 720,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverSettings {
    /// Whether network providers may be queried when no local cover exists.
    pub online_fetch: bool,
    /// Providers in priority order.
    pub providers: Vec<ProviderKind>,
    /// Per-request HTTP timeout (seconds).
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            online_fetch: true,
            providers: vec![ProviderKind::Musicbrainz, ProviderKind::Douban],
            http_timeout_secs: 15,
            user_agent: concat!("albumkit/", env!("CARGO_PKG_VERSION"), " (contact: local)")
                .to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[serde(alias = "music-brainz", alias = "mb", alias = "coverartarchive")]
    Musicbrainz,
    Douban,
}
