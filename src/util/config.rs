//! Configuration file support.
//!
//! The pipeline is configured by a `Kitpack.toml` at the project root. It is
//! located by walking up from the working directory, or given explicitly
//! with `--config`. Required keys are validated when the configuration is
//! turned into a [`BuildContext`](crate::core::BuildContext).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration file name.
pub const CONFIG_FILE: &str = "Kitpack.toml";

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal for the run: nothing is built or published.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find `Kitpack.toml` in `{}` or any parent directory", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required configuration `{0}`")]
    Missing(&'static str),

    #[error("invalid configuration `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library layout
    pub library: LibraryConfig,

    /// Build policy
    pub build: BuildConfig,

    /// External build engine invocation
    pub engine: EngineConfig,

    /// Registry CLI invocation
    pub publish: PublishConfig,
}

/// Where the library lives and how it is named.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Package namespace, e.g. `form-kit` for `@form-kit/select`
    pub namespace: Option<String>,

    /// Import prefix for cross-component imports, e.g. `@form-kit`
    pub alias_prefix: Option<String>,

    /// Component source root, relative to the project root
    pub source_root: Option<PathBuf>,

    /// Package output root, relative to the project root
    pub output_root: Option<PathBuf>,

    /// Entry file candidates inside each component directory
    pub entry_files: Vec<String>,

    /// Directory names under the source root that are never components
    pub reserved: Vec<String>,

    /// Extra path aliases (prefix -> directory relative to the project root)
    pub aliases: BTreeMap<String, PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            namespace: None,
            alias_prefix: None,
            source_root: None,
            output_root: None,
            entry_files: default_entry_files(),
            reserved: vec!["node_modules".to_string()],
            aliases: BTreeMap::new(),
        }
    }
}

fn default_entry_files() -> Vec<String> {
    ["index.ts", "index.tsx", "index.js", "index.jsx", "index.vue"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Build policy flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Let the engine split shared code into chunks
    pub chunking: bool,

    /// Emit one output module per source module
    pub preserve_modules: bool,

    /// Minify/obfuscate output
    pub minify: bool,

    /// Externalize third-party packages for every component
    pub external_dependencies: bool,

    /// Components that externalize third-party packages regardless of the global flag
    pub externalize: Vec<String>,

    /// Packages always treated as peer dependencies
    pub peer_packages: Vec<String>,

    /// Framework/runtime packages, always external
    pub runtime_packages: Vec<String>,

    /// Global identifiers for externalized packages
    pub globals: BTreeMap<String, String>,

    /// Delay after each heavy build, in milliseconds
    pub cooldown_ms: u64,

    /// Version registry file, relative to the project root
    pub registry_file: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            chunking: false,
            preserve_modules: false,
            minify: true,
            external_dependencies: false,
            externalize: Vec::new(),
            peer_packages: vec!["vue".to_string()],
            runtime_packages: vec!["vue".to_string()],
            globals: BTreeMap::from([("vue".to_string(), "Vue".to_string())]),
            cooldown_ms: 1000,
            registry_file: PathBuf::from("build/versions.json"),
        }
    }
}

/// How the external bundler is launched.
///
/// `args` may contain the placeholders `{config}`, `{format}` and
/// `{package}`, substituted per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            program: "npx".to_string(),
            args: ["vite", "build", "--config", "{config}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: Some(900),
        }
    }
}

/// How the registry CLI is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub program: String,
    pub publish_args: Vec<String>,
    pub dry_run_args: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            program: "npm".to_string(),
            publish_args: ["publish", "--access", "public"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dry_run_args: ["publish", "--dry-run"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout_secs: Some(300),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents, path)
    }

    /// Parse configuration text; `path` is only used for error messages.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Find `Kitpack.toml` by walking up from `start`.
pub fn find_config(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start;
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Err(ConfigError::NotFound(start.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
[library]
namespace = "form-kit"
alias_prefix = "@form-kit"
source_root = "packages/components/src"
output_root = "dist"
reserved = ["styles"]

[library.aliases]
"@shared" = "packages/shared"

[build]
external_dependencies = true
externalize = ["ArrayTable"]
peer_packages = ["vue", "element-plus"]
cooldown_ms = 0

[build.globals]
"element-plus" = "ElementPlus"

[publish]
program = "pnpm"
"#,
            Path::new("Kitpack.toml"),
        )
        .unwrap();

        assert_eq!(config.library.namespace.as_deref(), Some("form-kit"));
        assert_eq!(config.library.reserved, vec!["styles"]);
        assert_eq!(
            config.library.aliases.get("@shared"),
            Some(&PathBuf::from("packages/shared"))
        );
        assert!(config.build.external_dependencies);
        assert_eq!(config.build.cooldown_ms, 0);
        assert_eq!(config.build.globals["element-plus"], "ElementPlus");
        assert_eq!(config.publish.program, "pnpm");
        // untouched sections keep their defaults
        assert_eq!(config.publish.dry_run_args, vec!["publish", "--dry-run"]);
        assert_eq!(config.engine.program, "npx");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.library.namespace.is_none());
        assert!(config.library.entry_files.contains(&"index.ts".to_string()));
        assert_eq!(config.build.cooldown_ms, 1000);
        assert_eq!(config.build.registry_file, PathBuf::from("build/versions.json"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Config::parse("[library\n", Path::new("Kitpack.toml")).unwrap_err();
        assert!(err.to_string().contains("Kitpack.toml"));
    }

    #[test]
    fn test_find_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "").unwrap();
        let nested = tmp.path().join("packages/components");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested).unwrap(), tmp.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_find_config_missing() {
        let tmp = TempDir::new().unwrap();
        let err = find_config(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
