//! Terminal output for the build and release drivers.
//!
//! Every user-facing line goes through [`Shell`] as a right-aligned status
//! word followed by a message. Developer diagnostics go through `tracing`.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// How much the shell prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    /// Every status line, never a progress bar.
    Verbose,
}

/// Whether status words are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Color when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            other => Err(format!(
                "invalid color choice '{}'; expected auto, always or never",
                other
            )),
        }
    }
}

/// The word printed at the start of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Building,
    Packaging,
    Publishing,
    Packaged,
    Published,
    Finished,
    Skipped,
    Restored,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Progress,
    Done,
    Attention,
    Failure,
}

impl Tone {
    fn ansi(self) -> &'static str {
        match self {
            Tone::Progress => "\x1b[1;36m",
            Tone::Done => "\x1b[1;32m",
            Tone::Attention => "\x1b[1;33m",
            Tone::Failure => "\x1b[1;31m",
        }
    }
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Building => "Building",
            Status::Packaging => "Packaging",
            Status::Publishing => "Publishing",
            Status::Packaged => "Packaged",
            Status::Published => "Published",
            Status::Finished => "Finished",
            Status::Skipped => "Skipped",
            Status::Restored => "Restored",
            Status::Warning => "warning",
            Status::Error => "error",
        }
    }

    fn tone(self) -> Tone {
        match self {
            Status::Building | Status::Packaging | Status::Publishing => Tone::Progress,
            Status::Packaged | Status::Published | Status::Finished => Tone::Done,
            Status::Skipped | Status::Restored | Status::Warning => Tone::Attention,
            Status::Error => Tone::Failure,
        }
    }
}

const LABEL_WIDTH: usize = 12;

/// Status printer shared by a whole run.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };
        Shell { verbosity, color }
    }

    /// Build a shell from `--quiet`/`--verbose`; quiet wins.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        };
        Shell::new(verbosity, color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print `{status:>12} {msg}` to stderr. Quiet shells only print errors.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() && status != Status::Error {
            return;
        }
        eprintln!("{} {}", self.label(status), msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    fn label(&self, status: Status) -> String {
        let padded = format!("{:>width$}", status.label(), width = LABEL_WIDTH);
        if self.color {
            format!("{}{}\x1b[0m", status.tone().ansi(), padded)
        } else {
            padded
        }
    }

    /// Progress over `total` packages. Only normal verbosity draws a bar.
    pub fn progress(self: &Arc<Self>, total: u64, msg: impl Display) -> Progress {
        Progress::new(Arc::clone(self), total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}

/// A bar over a batch of packages. Status lines printed through it do not
/// tear the bar.
pub struct Progress {
    shell: Arc<Shell>,
    bar: Option<ProgressBar>,
    done: u64,
    total: u64,
    label: String,
}

impl Progress {
    fn new(shell: Arc<Shell>, total: u64, label: String) -> Self {
        let bar = (shell.verbosity == Verbosity::Normal && total > 1).then(|| {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_message(label.clone());
            bar
        });

        Progress {
            shell,
            bar,
            done: 0,
            total,
            label,
        }
    }

    pub fn inc(&mut self, delta: u64) {
        self.done += delta;
        match &self.bar {
            Some(bar) => bar.inc(delta),
            None if self.shell.is_verbose() => {
                eprintln!("  {} [{}/{}]", self.label, self.done, self.total)
            }
            None => {}
        }
    }

    pub fn println(&self, status: Status, msg: impl Display) {
        match &self.bar {
            Some(bar) => bar.suspend(|| self.shell.status(status, msg)),
            None => self.shell.status(status, msg),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// `0.50s` under a minute, `1.5m` above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
