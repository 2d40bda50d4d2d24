//! kitpack-release - bump and publish built packages

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kitpack::core::BumpKind;
use kitpack::ops::{release, ReleaseOptions};
use kitpack::util::process::SystemRunner;
use kitpack::util::{GlobalContext, Shell};

mod cli;

use cli::Cli;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("kitpack=debug")
    } else if cli.quiet {
        EnvFilter::new("kitpack=error")
    } else {
        EnvFilter::new("kitpack=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let bump: BumpKind = cli.bump.parse()?;
    let ctx = GlobalContext::new()?
        .with_config(cli.config.clone())
        .build_context()?;
    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.color));

    let opts = ReleaseOptions {
        bump,
        dry_run: cli.dry_run,
        filters: cli.filter,
    };
    let report = release(&ctx, &shell, &opts, &SystemRunner)?;

    if !report.is_success() {
        bail!("{} package(s) failed to publish", report.failed.len());
    }
    Ok(())
}
