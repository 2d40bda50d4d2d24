//! Implementation of `kitpack-release`.
//!
//! Every built package under the output root is bumped, checked with a
//! registry dry run and published. The bump is persisted before publishing
//! and rolled back whenever the publish does not go through, so a failed or
//! dry run leaves manifests and the version registry exactly as they were.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::core::manifest::{ManifestFile, MANIFEST_FILE};
use crate::core::versions::{bump_version, BumpKind, VersionRegistry};
use crate::core::{BuildContext, AGGREGATE_KEY};
use crate::util::process::{CommandRunner, IoMode, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Options for a release run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub bump: BumpKind,
    /// Check with the registry CLI, then restore every version
    pub dry_run: bool,
    /// Substrings matched against package and directory names
    pub filters: Vec<String>,
}

/// A built package directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub dir_name: String,
    pub dir: PathBuf,
    /// Package name from the manifest, if readable
    pub name: Option<String>,
}

impl ReleaseTarget {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.dir_name)
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn matches(&self, filters: &[String]) -> bool {
        if filters.is_empty() {
            return true;
        }
        let dir = self.dir_name.to_lowercase();
        let name = self.name.as_deref().unwrap_or_default().to_lowercase();
        filters
            .iter()
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .any(|f| dir.contains(&f) || name.contains(&f))
    }
}

/// Result for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Published(Version),
    /// Dry run passed; nothing was kept
    Checked(Version),
    Skipped(String),
    Failed(String),
}

/// Tally of a release run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ReleaseReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry entry captured before a bump.
struct RegistryBackup {
    key: String,
    previous: Option<String>,
}

/// Publishes built packages with bump, check and rollback.
pub struct PublishCoordinator<'a> {
    ctx: &'a BuildContext,
    registry: VersionRegistry,
    runner: &'a dyn CommandRunner,
    shell: &'a Arc<Shell>,
}

impl<'a> PublishCoordinator<'a> {
    pub fn new(ctx: &'a BuildContext, runner: &'a dyn CommandRunner, shell: &'a Arc<Shell>) -> Self {
        PublishCoordinator {
            ctx,
            registry: VersionRegistry::open(ctx.registry_path()),
            runner,
            shell,
        }
    }

    /// Package directories under the output root, components first and the
    /// aggregate library last.
    pub fn targets(&self, filters: &[String]) -> Result<Vec<ReleaseTarget>> {
        let root = self.ctx.output_root();
        if !root.is_dir() {
            tracing::warn!("output directory {} does not exist", root.display());
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("failed to read output directory {}", root.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read {}", root.display()))?;
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let dir = entry.path();
            if dir_name.starts_with('.') || !dir.join(MANIFEST_FILE).is_file() {
                continue;
            }
            let name = ManifestFile::load(&dir.join(MANIFEST_FILE))
                .ok()
                .and_then(|m| m.name().map(str::to_string));
            let target = ReleaseTarget { dir_name, dir, name };
            if target.matches(filters) {
                targets.push(target);
            }
        }

        let namespace = self.ctx.namespace();
        targets.sort_by(|a, b| {
            (a.dir_name == namespace, &a.dir_name).cmp(&(b.dir_name == namespace, &b.dir_name))
        });
        Ok(targets)
    }

    /// Release one target. Never returns an error; failures become
    /// [`TargetOutcome::Failed`] after the bump has been rolled back.
    pub fn release(&self, target: &ReleaseTarget, opts: &ReleaseOptions) -> TargetOutcome {
        let mut manifest = match ManifestFile::load(&target.manifest_path()) {
            Ok(m) => m,
            Err(e) => return TargetOutcome::Failed(format!("{:#}", e)),
        };
        if manifest.is_private() {
            return TargetOutcome::Skipped("private package".to_string());
        }
        let Some(previous) = manifest.version().map(str::to_string) else {
            return TargetOutcome::Skipped("no version".to_string());
        };
        let current = match Version::parse(&previous) {
            Ok(v) => v,
            Err(e) => return TargetOutcome::Failed(format!("invalid version `{}`: {}", previous, e)),
        };
        let next = bump_version(&current, opts.bump);

        let backup = match self.bump(target, &mut manifest, &next) {
            Ok(backup) => backup,
            Err(e) => {
                let restored = self.restore(target, &mut manifest, &previous, None);
                return TargetOutcome::Failed(with_restore(format!("{:#}", e), restored));
            }
        };

        match self.publish(target, &next, opts.dry_run) {
            Ok(()) if opts.dry_run => {
                let restored = self.restore(target, &mut manifest, &previous, backup.as_ref());
                match restored {
                    Ok(()) => TargetOutcome::Checked(next),
                    Err(e) => TargetOutcome::Failed(format!("dry run passed but restore failed: {:#}", e)),
                }
            }
            Ok(()) => TargetOutcome::Published(next),
            Err(e) => {
                let restored = self.restore(target, &mut manifest, &previous, backup.as_ref());
                TargetOutcome::Failed(with_restore(format!("{:#}", e), restored))
            }
        }
    }

    /// Registry key for a target, if the registry tracks it.
    fn registry_key(&self, target: &ReleaseTarget) -> Result<Option<String>> {
        if target.dir_name == self.ctx.namespace() {
            let tracked = self.registry.entry(AGGREGATE_KEY)?.is_some();
            return Ok(tracked.then(|| AGGREGATE_KEY.to_string()));
        }
        self.registry.find_key(&target.dir_name)
    }

    fn bump(
        &self,
        target: &ReleaseTarget,
        manifest: &mut ManifestFile,
        next: &Version,
    ) -> Result<Option<RegistryBackup>> {
        manifest.set_version(&next.to_string());
        manifest.save()?;

        let Some(key) = self.registry_key(target)? else {
            return Ok(None);
        };
        let previous = self.registry.entry(&key)?;
        self.registry.set(&key, next)?;
        tracing::debug!("{}: registry {} -> {}", target.dir_name, key, next);
        Ok(Some(RegistryBackup { key, previous }))
    }

    fn restore(
        &self,
        target: &ReleaseTarget,
        manifest: &mut ManifestFile,
        previous: &str,
        backup: Option<&RegistryBackup>,
    ) -> Result<()> {
        manifest.set_version(previous);
        manifest.save()?;
        if let Some(backup) = backup {
            self.registry.restore(&backup.key, backup.previous.as_deref())?;
        }
        self.shell.status(
            Status::Restored,
            format!("{} v{}", target.display_name(), previous),
        );
        Ok(())
    }

    fn command(&self, target: &ReleaseTarget, args: &[String], io: IoMode) -> ProcessBuilder {
        let settings = self.ctx.publish();
        ProcessBuilder::new(&settings.program)
            .args(args)
            .cwd(&target.dir)
            .timeout(settings.timeout)
            .io(io)
    }

    /// Dry-run check, then the real publish unless `dry_run`.
    fn publish(&self, target: &ReleaseTarget, next: &Version, dry_run: bool) -> Result<()> {
        let settings = self.ctx.publish();
        let name = target.display_name();

        self.shell
            .status(Status::Packaging, format!("{} v{} (dry run)", name, next));
        let check = self.command(target, &settings.dry_run_args, IoMode::Captured);
        run_checked(self.runner, &check, &target.dir)
            .with_context(|| format!("dry run failed for {} v{}", name, next))?;
        if dry_run {
            return Ok(());
        }

        self.shell
            .status(Status::Publishing, format!("{} v{}", name, next));
        let publish = self.command(target, &settings.publish_args, IoMode::Inherited);
        run_checked(self.runner, &publish, &target.dir)
            .with_context(|| format!("publish failed for {} v{}", name, next))
    }
}

fn run_checked(runner: &dyn CommandRunner, cmd: &ProcessBuilder, dir: &Path) -> Result<()> {
    let output = runner
        .run(cmd)
        .with_context(|| format!("failed to run `{}` in {}", cmd.display_command(), dir.display()))?;
    if output.success() {
        return Ok(());
    }
    let tail = output.stderr_tail(10);
    bail!(
        "`{}` exited with {}{}{}",
        cmd.display_command(),
        output
            .code
            .map(|c| format!("code {}", c))
            .unwrap_or_else(|| "no code".to_string()),
        if tail.is_empty() { "" } else { "\n" },
        tail
    )
}

fn with_restore(message: String, restored: Result<()>) -> String {
    match restored {
        Ok(()) => message,
        Err(e) => format!("{}; restoring the previous version also failed: {:#}", message, e),
    }
}

/// Release every matching package.
pub fn release(
    ctx: &BuildContext,
    shell: &Arc<Shell>,
    opts: &ReleaseOptions,
    runner: &dyn CommandRunner,
) -> Result<ReleaseReport> {
    let coordinator = PublishCoordinator::new(ctx, runner, shell);
    let targets = coordinator.targets(&opts.filters)?;
    if targets.is_empty() {
        shell.warn(format!(
            "no built packages found in {}",
            ctx.output_root().display()
        ));
    }

    let mut report = ReleaseReport::default();
    for target in &targets {
        let name = target.display_name().to_string();
        match coordinator.release(target, opts) {
            TargetOutcome::Published(version) => {
                shell.status(Status::Published, format!("{} v{}", name, version));
                report.succeeded.push(name);
            }
            TargetOutcome::Checked(version) => {
                shell.status(Status::Finished, format!("{} v{} dry run passed", name, version));
                report.succeeded.push(name);
            }
            TargetOutcome::Skipped(reason) => {
                shell.status(Status::Skipped, format!("{} ({})", name, reason));
                report.skipped.push(name);
            }
            TargetOutcome::Failed(message) => {
                shell.error(format!("{}: {}", name, message));
                report.failed.push((name, message));
            }
        }
    }

    let summary = format!(
        "{} succeeded, {} skipped, {} failed",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if report.is_success() {
        shell.status(Status::Finished, summary);
    } else {
        shell.error(summary);
    }
    Ok(report)
}
