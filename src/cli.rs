use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::{RunOptions, Stage};

/// Reconcile a music library and render lyric videos for every album.
#[derive(Parser, Debug)]
#[command(name = "albumkit", version)]
pub struct Cli {
    /// Project root; sources are read from `<root>/res`
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Output directory, relative to the project root
    #[arg(long, default_value = "dist")]
    pub dist: PathBuf,

    /// Which part of the pipeline to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub stage: Stage,

    /// Log every action without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Encode with the software encoder only
    #[arg(long)]
    pub no_gpu: bool,

    /// Render videos again even when a valid one exists
    #[arg(long)]
    pub overwrite: bool,

    /// Resolve rename collisions with numeric suffixes instead of deduplication
    #[arg(long)]
    pub force_rename: bool,

    /// Do not convert encrypted sources
    #[arg(long)]
    pub skip_decrypt: bool,

    /// Never query online cover providers
    #[arg(long)]
    pub no_online_cover: bool,

    /// Debug logging (`RUST_LOG` takes precedence)
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            stage: self.stage,
            dry_run: self.dry_run,
            use_accelerated: !self.no_gpu,
            overwrite: self.overwrite,
            force_rename: self.force_rename,
            online_cover: !self.no_online_cover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_everything() {
        let cli = Cli::parse_from(["albumkit"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.dist, PathBuf::from("dist"));
        let opts = cli.run_options();
        assert_eq!(opts.stage, Stage::All);
        assert!(opts.use_accelerated);
        assert!(opts.online_cover);
        assert!(!opts.dry_run);
    }

    #[test]
    fn switches_map_to_run_options() {
        let cli = Cli::parse_from([
            "albumkit",
            "--stage",
            "render",
            "--no-gpu",
            "--force-rename",
            "--no-online-cover",
            "--dry-run",
        ]);
        let opts = cli.run_options();
        assert_eq!(opts.stage, Stage::Render);
        assert!(!opts.use_accelerated);
        assert!(opts.force_rename);
        assert!(!opts.online_cover);
        assert!(opts.dry_run);
    }
}
