//! Jackline CLI: push pipeline scripts to Jenkins and stream their builds.
//!
//! Creates or updates a pipeline job from a local script, triggers it and
//! follows its console, and browses the step and global variable reference
//! published by the controller.

mod commands;
mod sink;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
