//! Test utilities and mocks for kitpack unit tests.
//!
//! The pipeline touches two things that are hard to exercise for real: the
//! registry CLI and the bundler. [`MockRunner`] stands in for the first,
//! [`FakeEngine`] for the second.
//!
//! # Example
//!
//! ```rust,ignore
//! use kitpack::test_support::{MockOutput, MockRunner};
//!
//! let runner = MockRunner::new()
//!     .on_contains("--dry-run", MockOutput::failure(1, "E403"));
//! ```

pub mod fixtures;

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::builder::engine::{BuildEngine, EngineJob, ModuleFormat};
use crate::util::process::{CommandRunner, IoMode, ProcessBuilder, ProcessOutput};

pub use fixtures::*;

/// Canned process output.
#[derive(Debug, Clone)]
pub struct MockOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        MockOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

impl Default for MockOutput {
    fn default() -> Self {
        MockOutput::success("")
    }
}

impl From<MockOutput> for ProcessOutput {
    fn from(out: MockOutput) -> Self {
        ProcessOutput {
            code: Some(out.status),
            stdout: out.stdout,
            stderr: out.stderr,
        }
    }
}

/// Pattern for matching a rendered command line.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    Contains(String),
    Any,
}

impl CommandPattern {
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
struct Expectation {
    pattern: CommandPattern,
    output: MockOutput,
    times: Option<usize>,
    used: usize,
}

impl Expectation {
    fn available(&self) -> bool {
        self.times.map_or(true, |n| self.used < n)
    }
}

/// One command seen by a [`MockRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub io: IoMode,
}

/// Command runner that returns canned output and records every call.
///
/// Expectations are tried in registration order. Commands matching none of
/// them succeed with empty output.
#[derive(Debug, Default)]
pub struct MockRunner {
    expectations: Mutex<Vec<Expectation>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_spawn: Option<CommandPattern>,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Answer commands matching `pattern`, at most `times` times if given.
    pub fn on(mut self, pattern: CommandPattern, output: MockOutput, times: Option<usize>) -> Self {
        self.expectations.get_mut().unwrap().push(Expectation {
            pattern,
            output,
            times,
            used: 0,
        });
        self
    }

    pub fn on_contains(self, substring: &str, output: MockOutput) -> Self {
        self.on(CommandPattern::Contains(substring.to_string()), output, None)
    }

    /// Make matching commands fail to start at all.
    pub fn fail_to_spawn(mut self, pattern: CommandPattern) -> Self {
        self.fail_spawn = Some(pattern);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        let command = cmd.display_command();
        self.calls.lock().unwrap().push(RecordedCall {
            command: command.clone(),
            cwd: cmd.get_cwd().map(|p| p.to_path_buf()),
            io: cmd.get_io(),
        });

        if self.fail_spawn.as_ref().is_some_and(|p| p.matches(&command)) {
            bail!("failed to spawn `{}`", command);
        }

        let mut expectations = self.expectations.lock().unwrap();
        for exp in expectations.iter_mut() {
            if exp.available() && exp.pattern.matches(&command) {
                exp.used += 1;
                return Ok(exp.output.clone().into());
            }
        }
        Ok(MockOutput::default().into())
    }
}

/// Build engine that writes placeholder output instead of bundling.
#[derive(Debug, Default)]
pub struct FakeEngine {
    jobs: Mutex<Vec<EngineJob>>,
    entry_sources: Mutex<Vec<String>>,
    style: bool,
    types: bool,
    fail_on: Option<ModuleFormat>,
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine::default()
    }

    /// Emit `style.css` next to the ES output.
    pub fn with_style(mut self) -> Self {
        self.style = true;
        self
    }

    /// Emit `index.d.ts` next to the ES output.
    pub fn with_types(mut self) -> Self {
        self.types = true;
        self
    }

    pub fn fail_on(mut self, format: ModuleFormat) -> Self {
        self.fail_on = Some(format);
        self
    }

    pub fn jobs(&self) -> Vec<EngineJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Contents of each job's staged entry file at build time.
    pub fn entry_sources(&self) -> Vec<String> {
        self.entry_sources.lock().unwrap().clone()
    }
}

impl BuildEngine for FakeEngine {
    fn build(&self, job: &EngineJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        let source = std::fs::read_to_string(&job.entry).unwrap_or_default();
        self.entry_sources.lock().unwrap().push(source);

        if self.fail_on == Some(job.format) {
            bail!("engine failed for {}", job.package_name);
        }

        std::fs::create_dir_all(&job.out_dir)?;
        std::fs::write(
            job.out_dir.join(format!("{}.{}", job.file_name, job.extension)),
            "export {}\n",
        )?;
        if job.format == ModuleFormat::Es {
            if self.style {
                std::fs::write(job.out_dir.join("style.css"), "")?;
            }
            if self.types && job.declarations {
                std::fs::write(job.out_dir.join("index.d.ts"), "export {}\n")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_matches_in_order() {
        let runner = MockRunner::new()
            .on(
                CommandPattern::Contains("publish".into()),
                MockOutput::failure(1, "first"),
                Some(1),
            )
            .on_contains("npm", MockOutput::success("ok"));

        let cmd = ProcessBuilder::new("npm").arg("publish");
        assert_eq!(runner.run(&cmd).unwrap().stderr, "first");
        assert_eq!(runner.run(&cmd).unwrap().stdout, "ok");
        assert!(runner.run(&ProcessBuilder::new("true")).unwrap().success());
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_spawn_failure_is_recorded() {
        let runner = MockRunner::new().fail_to_spawn(CommandPattern::Contains("vite".into()));

        assert!(runner.run(&ProcessBuilder::new("npx").arg("vite")).is_err());
        assert!(runner.run(&ProcessBuilder::new("npm")).is_ok());
        assert_eq!(runner.calls().len(), 2);
    }
}
