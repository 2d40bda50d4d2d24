//! Implementation of `kitpack [command] [mode]`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};

use crate::builder::{BuildEngine, BuildOrchestrator};
use crate::core::{discover_components, BuildContext, ComponentName, ProjectPackage, VersionRegistry};
use crate::util::process::CommandRunner;
use crate::util::shell::{format_duration, Shell, Status};

/// What to do with each selected package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildCommand {
    Build,
    #[default]
    BuildPublish,
}

impl BuildCommand {
    pub fn publishes(self) -> bool {
        self == BuildCommand::BuildPublish
    }
}

impl FromStr for BuildCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "build" => Ok(BuildCommand::Build),
            "build-publish" => Ok(BuildCommand::BuildPublish),
            other => bail!("unknown command `{}`; expected `build` or `build-publish`", other),
        }
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildCommand::Build => f.write_str("build"),
            BuildCommand::BuildPublish => f.write_str("build-publish"),
        }
    }
}

/// Which packages a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Every component, then the aggregate library
    All,
    Library,
    AllComponents,
    Component(ComponentName),
}

impl BuildMode {
    /// Parse a mode argument against the discovered components.
    pub fn parse(mode: &str, components: &BTreeSet<ComponentName>) -> Result<Self> {
        match mode {
            "all" => return Ok(BuildMode::All),
            "library" => return Ok(BuildMode::Library),
            "allComponent" => return Ok(BuildMode::AllComponents),
            _ => {}
        }

        let found = components
            .iter()
            .find(|c| c.as_str() == mode)
            .or_else(|| components.iter().find(|c| c.as_str().eq_ignore_ascii_case(mode)));
        match found {
            Some(component) => Ok(BuildMode::Component(component.clone())),
            None => {
                let mut valid = vec!["all", "library", "allComponent"];
                valid.extend(components.iter().map(|c| c.as_str()));
                bail!("unknown mode `{}`; valid modes: {}", mode, valid.join(", "))
            }
        }
    }

    /// Packages to build, in order. The library always comes last.
    pub fn targets(&self, components: &BTreeSet<ComponentName>) -> Vec<ComponentName> {
        match self {
            BuildMode::All => components
                .iter()
                .cloned()
                .chain(std::iter::once(ComponentName::aggregate()))
                .collect(),
            BuildMode::Library => vec![ComponentName::aggregate()],
            BuildMode::AllComponents => components.iter().cloned().collect(),
            BuildMode::Component(c) => vec![c.clone()],
        }
    }
}

/// Parse the heavy-plugin switch: `true` or `1` enable it.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

/// Options for a build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub command: BuildCommand,
    pub mode: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            command: BuildCommand::default(),
            mode: "all".to_string(),
        }
    }
}

/// Tally of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<ComponentName>,
    pub failed: Vec<(ComponentName, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build (and optionally publish) the packages selected by `opts.mode`.
///
/// A failing package is recorded and the batch moves on. Configuration,
/// discovery and mode errors abort before anything is built.
pub fn build(
    ctx: &BuildContext,
    shell: &Arc<Shell>,
    opts: &BuildOptions,
    engine: &dyn BuildEngine,
    runner: &dyn CommandRunner,
) -> Result<BatchReport> {
    let project = ProjectPackage::load(ctx.project_root())?;
    let components = discover_components(ctx)?;
    let mode = BuildMode::parse(&opts.mode, &components)?;
    let targets = mode.targets(&components);
    let registry = VersionRegistry::open(ctx.registry_path());

    tracing::info!(
        "{} {} package(s) ({} components discovered)",
        opts.command,
        targets.len(),
        components.len()
    );

    let orchestrator = BuildOrchestrator::new(ctx, &project, &components, &registry, engine, runner);
    let publish = opts.command.publishes();
    let mut report = BatchReport::default();
    let mut progress = shell.progress(targets.len() as u64, "Building");

    for target in &targets {
        let package = target.package_name(ctx.namespace());
        progress.println(Status::Building, &package);
        let start = Instant::now();

        match orchestrator.build(target, publish) {
            Ok(outcome) => {
                let status = if outcome.published {
                    Status::Published
                } else {
                    Status::Packaged
                };
                progress.println(
                    status,
                    format!(
                        "{} v{} in {}",
                        outcome.package_name,
                        outcome.version,
                        format_duration(start.elapsed())
                    ),
                );
                report.succeeded.push(target.clone());
            }
            Err(e) => {
                progress.println(Status::Error, format!("{}: {:#}", package, e));
                report.failed.push((target.clone(), format!("{:#}", e)));
            }
        }
        progress.inc(1);

        if !ctx.cooldown().is_zero() {
            tracing::debug!("cooling down for {:?}", ctx.cooldown());
            std::thread::sleep(ctx.cooldown());
        }
    }
    progress.finish();

    if report.is_success() {
        shell.status(
            Status::Finished,
            format!("{} package(s) {}", report.succeeded.len(), done_verb(publish)),
        );
    } else {
        let names: Vec<String> = report.failed.iter().map(|(c, _)| c.to_string()).collect();
        shell.error(format!(
            "{} succeeded, {} failed: {}",
            report.succeeded.len(),
            report.failed.len(),
            names.join(", ")
        ));
    }
    Ok(report)
}

fn done_verb(publish: bool) -> &'static str {
    if publish {
        "built and published"
    } else {
        "built"
    }
}
