//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;
use kitpack::util::shell::ColorChoice;

/// Bump, check and publish every built package
#[derive(Parser)]
#[command(name = "kitpack-release")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Version segment to bump: major, minor or patch
    #[arg(default_value = "patch")]
    pub bump: String,

    /// Check with the registry without publishing; versions are restored
    #[arg(short, long)]
    pub dry_run: bool,

    /// Only packages whose name or directory contains one of these
    #[arg(long, value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Path to Kitpack.toml (searched upwards from the working directory by default)
    #[arg(long, env = "KITPACK_CONFIG")]
    pub config: Option<PathBuf>,
}
