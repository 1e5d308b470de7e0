use std::path::{Path, PathBuf};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::decrypt::locate_decryptor;
use crate::pipeline::{Layout, Stage};
use crate::tools::{ToolPaths, find_executable};

use super::RunError;

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn discover_tools(settings: &Settings) -> Result<ToolPaths, RunError> {
    let find = |name: &'static str, explicit: Option<&Path>| {
        find_executable(name, explicit).ok_or_else(|| {
            error!("{name} not found (set tools.{name} or add it to PATH)");
            RunError::MissingTool(name)
        })
    };
    let paths = ToolPaths {
        ffmpeg: find("ffmpeg", settings.tools.ffmpeg.as_deref())?,
        ffprobe: find("ffprobe", settings.tools.ffprobe.as_deref())?,
    };
    info!("ffmpeg: {}", paths.ffmpeg.display());
    info!("ffprobe: {}", paths.ffprobe.display());
    Ok(paths)
}

/// Sources are required unless only rendering; rendering needs an output tree.
pub fn check_layout(layout: &Layout, stage: Stage) -> Result<(), RunError> {
    if stage == Stage::Render {
        if !layout.output_root.is_dir() {
            error!("output directory {} does not exist", layout.output_root.display());
            return Err(RunError::MissingDir(layout.output_root.clone()));
        }
    } else if !layout.source_root.is_dir() {
        error!("source directory {} does not exist", layout.source_root.display());
        return Err(RunError::MissingDir(layout.source_root.clone()));
    }
    Ok(())
}

pub fn decryptor(project_root: &Path, settings: &Settings) -> Result<PathBuf, RunError> {
    let path = locate_decryptor(project_root, settings.tools.decryptor.as_deref()).map_err(|e| {
        error!("{e}; place it in {}/tools or pass --skip-decrypt", project_root.display());
        RunError::Decryptor(e)
    })?;
    info!("decryptor: {}", path.display());
    Ok(path)
}
