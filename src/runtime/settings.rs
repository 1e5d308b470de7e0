use tracing::warn;

use crate::config;

/// Effective settings. A broken or invalid config never stops a run.
pub fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                warn!("invalid config, using defaults: {msg}");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            let path = config::resolve_config_path();
            warn!("failed to load config {path:?}, using defaults: {e}");
            config::Settings::default()
        }
    }
}
