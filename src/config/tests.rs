use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_albumkit_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("ALBUMKIT_CONFIG_PATH", "/tmp/albumkit-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/albumkit-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("albumkit")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("albumkit")
            .join("config.toml")
    );
}

#[test]
fn defaults_pass_validation() {
    let s = Settings::default();
    assert!(s.validate().is_ok());
    assert_eq!(s.synth.max_edge, 720);
    assert_eq!(
        s.cover.providers,
        vec![ProviderKind::Musicbrainz, ProviderKind::Douban]
    );
}

#[test]
fn validate_rejects_zero_timeouts_and_attempts() {
    let mut s = Settings::default();
    s.synth.encode_timeout_secs = 0;
    let err = s.validate().unwrap_err();
    assert!(err.contains("synth.encode_timeout_secs"));

    let mut s = Settings::default();
    s.synth.software_attempts = 0;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.library.audio_extensions = vec![" ".to_string()];
    assert!(s.validate().is_err());
}

#[test]
fn settings_load_from_config_file_and_parse_provider_aliases() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[library]
audio_extensions = ["mp3"]
include_hidden = false

[tools]
ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
probe_timeout_secs = 3

[synth]
accelerated_codec = "h264_qsv"
max_edge = 1080
software_attempts = 2

[cover]
online_fetch = false
providers = ["douban", "mb"]
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ALBUMKIT_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ALBUMKIT__SYNTH__MAX_EDGE");

    let s = Settings::load().unwrap();
    assert_eq!(s.library.audio_extensions, vec!["mp3".to_string()]);
    assert!(!s.library.include_hidden);
    assert_eq!(
        s.tools.ffmpeg.as_deref(),
        Some(std::path::Path::new("/opt/ffmpeg/bin/ffmpeg"))
    );
    assert_eq!(s.tools.probe_timeout_secs, 3);
    assert_eq!(s.tools.decode_timeout_secs, 30);
    assert_eq!(s.synth.accelerated_codec, "h264_qsv");
    assert_eq!(s.synth.max_edge, 1080);
    assert_eq!(s.synth.software_attempts, 2);
    assert!(!s.cover.online_fetch);
    assert_eq!(
        s.cover.providers,
        vec![ProviderKind::Douban, ProviderKind::Musicbrainz]
    );
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[synth]
max_edge = 1080
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ALBUMKIT_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("ALBUMKIT__SYNTH__MAX_EDGE", "480");

    let s = Settings::load().unwrap();
    assert_eq!(s.synth.max_edge, 480);
}

#[test]
fn settings_round_trip_through_toml_dump() {
    let s = Settings::default();
    let text = toml::to_string_pretty(&s).unwrap();
    assert!(text.contains("[synth]"));
    assert!(text.contains("h264_nvenc"));
}
