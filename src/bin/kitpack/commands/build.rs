//! `kitpack [command] [mode] [exclude-heavy-plugins]`

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::Cli;
use kitpack::builder::CommandEngine;
use kitpack::ops::{build, parse_flag, BuildCommand, BuildOptions};
use kitpack::util::process::SystemRunner;
use kitpack::util::{GlobalContext, Shell};

pub fn execute(cli: &Cli) -> Result<()> {
    let command: BuildCommand = cli.command.parse()?;
    let gctx = GlobalContext::new()?.with_config(cli.config.clone());
    let ctx = gctx
        .build_context()?
        .with_exclude_heavy_plugins(parse_flag(&cli.exclude_heavy_plugins));

    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.color));
    let runner = SystemRunner;
    let engine = CommandEngine::new(ctx.engine(), &runner, ctx.project_root());

    let opts = BuildOptions {
        command,
        mode: cli.mode.clone(),
    };
    let report = build(&ctx, &shell, &opts, &engine, &runner)?;

    if !report.is_success() {
        bail!(
            "{} of {} package(s) failed",
            report.failed.len(),
            report.failed.len() + report.succeeded.len()
        );
    }
    Ok(())
}
