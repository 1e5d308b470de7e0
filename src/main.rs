use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod cleanup;
mod cli;
mod config;
mod cover;
mod decrypt;
mod fingerprint;
mod library;
mod lyrics;
mod pipeline;
mod reconcile;
mod runtime;
mod staging;
mod synth;
mod tags;
mod tools;

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();
    match runtime::run(&cli) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.downcast_ref::<runtime::RunError>().is_some() => {
            error!("{e}");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e),
    }
}
