use std::path::PathBuf;

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::cover::build_providers;
use crate::decrypt::DecryptorError;
use crate::pipeline::{Layout, Pipeline, needs_decryptor};
use crate::tags::LoftyTagStore;
use crate::tools::{MediaTools, SystemRunner};

mod settings;
mod startup;

/// Preconditions that stop a run before anything is touched.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("required tool `{0}` not found")]
    MissingTool(&'static str),
    #[error("directory {0} does not exist")]
    MissingDir(PathBuf),
    #[error(transparent)]
    Decryptor(#[from] DecryptorError),
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    startup::init_logging(cli.verbose);
    let settings = settings::load_settings();

    if cli.print_config {
        let text = toml::to_string_pretty(&settings).context("cannot serialize settings")?;
        print!("{text}");
        return Ok(());
    }

    let options = cli.run_options();
    let layout = Layout::new(&cli.root, &cli.dist);
    startup::check_layout(&layout, options.stage)?;
    let tools = startup::discover_tools(&settings)?;

    let decryptor = if needs_decryptor(&layout, &settings, &options) {
        if cli.skip_decrypt {
            warn!("encrypted sources present, decryption skipped");
            None
        } else {
            Some(startup::decryptor(&cli.root, &settings)?)
        }
    } else {
        None
    };

    let runner = SystemRunner;
    let media = MediaTools::new(tools, &runner, &settings.tools);
    let providers = build_providers(&settings.cover);
    let tags = LoftyTagStore;
    let pipeline = Pipeline {
        settings: &settings,
        options,
        tags: &tags,
        runner: &runner,
        media: &media,
        providers: &providers,
        decryptor,
    };

    info!(
        "stage {:?}: {} -> {}{}",
        options.stage,
        layout.source_root.display(),
        layout.output_root.display(),
        if options.dry_run { " (dry run)" } else { "" }
    );
    let summary = pipeline.run(&layout);
    summary.log(options.dry_run);
    if summary.has_failures() {
        warn!("some items failed; running again retries them");
    }
    Ok(())
}
