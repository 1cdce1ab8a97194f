mod cli;
mod commands;
mod config;
mod downloader;
mod fetcher;
mod headers;
mod logging;
mod mapper;
mod persister;
mod report;
mod scheduler;
mod state;
mod utils;

use anyhow::Result;
use clap::Parser;
use indicatif::{MultiProgress, ProgressDrawTarget};

use crate::cli::Args;

fn main() -> Result<()> {
    let config = Args::parse().into_config();

    // Bars and logs share stderr; outcome lines go to stdout. The bars are
    // hidden when stderr is not a terminal.
    let progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(5));
    crate::logging::init_logging(config.verbose, &progress);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(crate::commands::run_downloads(config, progress))?;
    Ok(())
}
