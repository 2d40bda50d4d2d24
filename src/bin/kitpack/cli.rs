//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;
use kitpack::util::shell::ColorChoice;

/// Build library components as standalone packages and publish them
#[derive(Parser)]
#[command(name = "kitpack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// `build` or `build-publish`
    #[arg(default_value = "build-publish")]
    pub command: String,

    /// `all`, `library`, `allComponent` or a component name
    #[arg(default_value = "all")]
    pub mode: String,

    /// `true` or `1` to skip type declarations and asset compression
    #[arg(default_value = "false")]
    pub exclude_heavy_plugins: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Path to Kitpack.toml (searched upwards from the working directory by default)
    #[arg(long, global = true, env = "KITPACK_CONFIG")]
    pub config: Option<PathBuf>,
}
