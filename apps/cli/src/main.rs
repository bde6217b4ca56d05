//! Outreach CLI — research-grounded cold email drafting.
//!
//! Reads a campaign request, researches the target company's site, and
//! prints three subject lines, two email bodies, and a spam-risk score.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
