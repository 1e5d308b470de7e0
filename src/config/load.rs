use std::{env, path::PathBuf};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `ALBUMKIT__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("ALBUMKIT")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.library.audio_extensions.iter().all(|e| e.trim().is_empty()) {
            return Err("library.audio_extensions must name at least one extension".to_string());
        }
        let timeouts = [
            ("tools.probe_timeout_secs", self.tools.probe_timeout_secs),
            ("tools.decode_timeout_secs", self.tools.decode_timeout_secs),
            ("tools.repair_timeout_secs", self.tools.repair_timeout_secs),
            ("tools.decrypt_timeout_secs", self.tools.decrypt_timeout_secs),
            ("synth.encode_timeout_secs", self.synth.encode_timeout_secs),
            ("cover.http_timeout_secs", self.cover.http_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, v)| *v == 0) {
            return Err(format!("{name} must be >= 1"));
        }
        if self.synth.accelerated_attempts == 0 || self.synth.software_attempts == 0 {
            return Err("synth attempt counts must be >= 1".to_string());
        }
        if self.synth.max_edge < 16 {
            return Err("synth.max_edge must be >= 16".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `ALBUMKIT_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("ALBUMKIT_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/albumkit/config.toml`
/// or `~/.config/albumkit/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".config"))
    } else {
        None
    };

    config_home.map(|d| d.join("albumkit").join("config.toml"))
}
