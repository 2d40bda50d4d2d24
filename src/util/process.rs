//! Subprocess execution utilities.
//!
//! Every external tool the pipeline touches (the bundler, the registry CLI)
//! goes through [`ProcessBuilder`] and a [`CommandRunner`]. The runner is the
//! seam tests use to replace real process spawning.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use thiserror::Error;

/// How the child's stdout/stderr are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Collect output so the caller can inspect it (pre-checks).
    #[default]
    Captured,
    /// Stream output straight to the terminal (long builds, real publish).
    Inherited,
}

/// Errors that stop a process from producing an exit status at all.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("`{command}` was terminated by a signal")]
    Terminated { command: String },
}

/// Result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` if the platform reported none
    pub code: Option<i32>,
    /// Captured stdout (empty in inherited mode)
    pub stdout: String,
    /// Captured stderr (empty in inherited mode)
    pub stderr: String,
}

impl ProcessOutput {
    /// Check whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last few lines of stderr, for error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
    io: IoMode,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
            io: IoMode::Captured,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose captured or inherited I/O.
    pub fn io(mut self, io: IoMode) -> Self {
        self.io = io;
        self
    }

    /// Get the working directory.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Get the I/O mode.
    pub fn get_io(&self) -> IoMode {
        self.io
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        // `npm` and `npx` are batch shims on Windows; `which` finds them via PATHEXT.
        let program = which::which(&self.program).unwrap_or_else(|_| self.program.clone());
        let mut cmd = Command::new(program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        match self.io {
            IoMode::Captured => {
                cmd.stdout(Stdio::piped());
                cmd.stderr(Stdio::piped());
            }
            IoMode::Inherited => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }
        cmd.stdin(Stdio::null());

        cmd
    }

    /// Execute the command and wait for completion.
    ///
    /// A non-zero exit is not an error here; inspect [`ProcessOutput::success`].
    pub fn exec(&self) -> Result<ProcessOutput> {
        tracing::debug!("running `{}`", self.display_command());

        let mut child = self
            .build_command()
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let code = self.wait(&mut child)?;

        Ok(ProcessOutput {
            code,
            stdout: stdout.map(join_reader).unwrap_or_default(),
            stderr: stderr.map(join_reader).unwrap_or_default(),
        })
    }

    fn wait(&self, child: &mut Child) -> Result<Option<i32>> {
        let Some(timeout) = self.timeout else {
            let status = child
                .wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
            return self.exit_code(status);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                return self.exit_code(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::TimedOut {
                    command: self.display_command(),
                    timeout,
                }
                .into());
            }
            thread::sleep(Duration::from_millis(50));
        }
    }

    /// A missing exit code means a signal ended the process.
    fn exit_code(&self, status: ExitStatus) -> Result<Option<i32>> {
        match status.code() {
            Some(code) => Ok(Some(code)),
            None => Err(ProcessError::Terminated {
                command: self.display_command(),
            }
            .into()),
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Runs commands on behalf of the build and publish workflows.
pub trait CommandRunner {
    /// Run the command to completion.
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        cmd.exec()
    }
}
