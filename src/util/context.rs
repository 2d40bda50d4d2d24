//! Global context for kitpack operations.
//!
//! Resolves the working directory and configuration file and turns them into
//! the immutable [`BuildContext`] every operation reads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::BuildContext;
use crate::util::config::{find_config, Config};

/// Process-level context: where we run and which config we use.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Config file given on the command line
    config_override: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a new GlobalContext from the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(GlobalContext {
            cwd,
            config_override: None,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            config_override: None,
        }
    }

    /// Use an explicit config file instead of searching for one.
    pub fn with_config(mut self, path: Option<PathBuf>) -> Self {
        self.config_override = path.map(|p| if p.is_absolute() { p } else { self.cwd.join(p) });
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Locate the config file.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_override {
            Some(path) => Ok(path.clone()),
            None => Ok(find_config(&self.cwd)?),
        }
    }

    /// Load and validate configuration.
    ///
    /// The project root is the directory containing the config file.
    pub fn build_context(&self) -> Result<BuildContext> {
        let config_path = self.config_path()?;
        let config = Config::load(&config_path)?;
        let project_root = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        tracing::debug!("using config {}", config_path.display());
        Ok(BuildContext::from_config(&config, &project_root)?)
    }
}
