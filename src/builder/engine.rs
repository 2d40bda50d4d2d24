//! The external build engine seam.
//!
//! kitpack never bundles anything itself. Each output format is described by
//! an [`EngineJob`], written to disk as JSON, and handed to the configured
//! engine command.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::builder::externals::ExternalRules;
use crate::core::context::ToolSettings;
use crate::util::fs::write_string;
use crate::util::process::{CommandRunner, IoMode, ProcessBuilder};

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Native ES modules under `es/`
    Es,
    /// CommonJS with named exports under `lib/`
    Cjs,
}

impl ModuleFormat {
    /// Both formats in build order.
    pub const ALL: [ModuleFormat; 2] = [ModuleFormat::Es, ModuleFormat::Cjs];

    /// Output directory inside the package.
    pub fn dir(self) -> &'static str {
        match self {
            ModuleFormat::Es => "es",
            ModuleFormat::Cjs => "lib",
        }
    }

    /// Extension of the emitted entry file.
    pub fn extension(self) -> &'static str {
        match self {
            ModuleFormat::Es => "mjs",
            ModuleFormat::Cjs => "js",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleFormat::Es => "es",
            ModuleFormat::Cjs => "cjs",
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the engine needs for one format of one package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineJob {
    pub component: String,
    pub package_name: String,
    /// Staged (rewritten) source root
    pub root: PathBuf,
    pub entry: PathBuf,
    pub out_dir: PathBuf,
    pub format: ModuleFormat,
    /// Entry file name without extension
    pub file_name: String,
    pub extension: String,
    pub named_exports: bool,
    pub aliases: BTreeMap<String, PathBuf>,
    pub external: ExternalRules,
    pub globals: BTreeMap<String, String>,
    pub chunking: bool,
    pub preserve_modules: bool,
    pub minify: bool,
    pub css_preprocess: bool,
    /// Emit type declarations
    pub declarations: bool,
    /// Compress emitted assets
    pub compress: bool,
    /// Scratch directory owned by this build
    #[serde(skip)]
    pub work_dir: PathBuf,
}

impl EngineJob {
    /// Path the serialized job is written to.
    pub fn job_file(&self) -> PathBuf {
        self.work_dir
            .join(format!("kitpack-job.{}.json", self.format.as_str()))
    }
}

/// Runs one engine job to completion.
pub trait BuildEngine {
    fn build(&self, job: &EngineJob) -> Result<()>;
}

/// Engine backed by an external command.
///
/// Arguments may use the placeholders `{config}` (job file), `{format}` and
/// `{package}`.
pub struct CommandEngine<'a> {
    settings: &'a ToolSettings,
    runner: &'a dyn CommandRunner,
    cwd: PathBuf,
}

impl<'a> CommandEngine<'a> {
    pub fn new(settings: &'a ToolSettings, runner: &'a dyn CommandRunner, cwd: &Path) -> Self {
        CommandEngine {
            settings,
            runner,
            cwd: cwd.to_path_buf(),
        }
    }

    fn command(&self, job: &EngineJob, job_file: &Path) -> ProcessBuilder {
        let config = job_file.display().to_string();
        let args = self.settings.args.iter().map(|arg| {
            arg.replace("{config}", &config)
                .replace("{format}", job.format.as_str())
                .replace("{package}", &job.package_name)
        });

        ProcessBuilder::new(&self.settings.program)
            .args(args)
            .cwd(&self.cwd)
            .timeout(self.settings.timeout)
            .io(IoMode::Inherited)
    }
}

impl BuildEngine for CommandEngine<'_> {
    fn build(&self, job: &EngineJob) -> Result<()> {
        let job_file = job.job_file();
        let json = serde_json::to_string_pretty(job).context("failed to serialize engine job")?;
        write_string(&job_file, &json)?;

        let cmd = self.command(job, &job_file);
        let output = self
            .runner
            .run(&cmd)
            .with_context(|| format!("failed to run build engine `{}`", cmd.display_command()))?;

        if !output.success() {
            let tail = output.stderr_tail(20);
            bail!(
                "build engine exited with {} for {} ({}){}{}",
                output
                    .code
                    .map(|c| format!("code {}", c))
                    .unwrap_or_else(|| "no code".to_string()),
                job.package_name,
                job.format,
                if tail.is_empty() { "" } else { "\n" },
                tail
            );
        }
        Ok(())
    }
}
