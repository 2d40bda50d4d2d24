//! BuildContext - the immutable per-run configuration.
//!
//! Created once from a validated [`Config`] and shared by reference with
//! every stage of the pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::component::ComponentName;
use crate::util::config::{Config, ConfigError};

/// Policy flags forwarded to the build engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub chunking: bool,
    pub preserve_modules: bool,
    pub minify: bool,
    /// Externalize third-party packages for every component
    pub external_dependencies: bool,
    /// Skip type declaration generation and asset compression
    pub exclude_heavy_plugins: bool,
}

/// Invocation settings for an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Invocation settings for the registry CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub program: String,
    pub publish_args: Vec<String>,
    pub dry_run_args: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    namespace: String,
    alias_prefix: String,
    project_root: PathBuf,
    source_root: PathBuf,
    output_root: PathBuf,
    entry_files: Vec<String>,
    reserved: Vec<String>,
    /// Alias prefix -> directory, longest prefix first
    aliases: Vec<(String, PathBuf)>,
    flags: BuildFlags,
    peer_packages: Vec<String>,
    runtime_packages: Vec<String>,
    externalize: Vec<String>,
    globals: BTreeMap<String, String>,
    cooldown: Duration,
    registry_path: PathBuf,
    engine: ToolSettings,
    publish: PublishSettings,
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn required_path<'a>(
    value: &'a Option<PathBuf>,
    key: &'static str,
) -> Result<&'a Path, ConfigError> {
    match value.as_deref() {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(ConfigError::Missing(key)),
    }
}

impl BuildContext {
    /// Validate configuration and resolve paths against the project root.
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self, ConfigError> {
        let lib = &config.library;
        let namespace = required(&lib.namespace, "library.namespace")?;
        let alias_prefix = required(&lib.alias_prefix, "library.alias_prefix")?;
        let source_root = project_root.join(required_path(&lib.source_root, "library.source_root")?);
        let output_root = project_root.join(required_path(&lib.output_root, "library.output_root")?);

        if namespace.contains('/') || namespace.starts_with('@') {
            return Err(ConfigError::Invalid {
                key: "library.namespace",
                message: format!("`{}` must be a bare name without `@` or `/`", namespace),
            });
        }
        if alias_prefix.ends_with('/') {
            return Err(ConfigError::Invalid {
                key: "library.alias_prefix",
                message: format!("`{}` must not end with `/`", alias_prefix),
            });
        }
        if lib.entry_files.is_empty() {
            return Err(ConfigError::Missing("library.entry_files"));
        }

        let mut aliases: Vec<(String, PathBuf)> = lib
            .aliases
            .iter()
            .map(|(key, dir)| (key.clone(), project_root.join(dir)))
            .collect();
        if !aliases.iter().any(|(key, _)| key == alias_prefix) {
            aliases.push((alias_prefix.to_string(), source_root.clone()));
        }
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let build = &config.build;
        Ok(BuildContext {
            namespace: namespace.to_string(),
            alias_prefix: alias_prefix.to_string(),
            project_root: project_root.to_path_buf(),
            source_root,
            output_root,
            entry_files: lib.entry_files.clone(),
            reserved: lib.reserved.clone(),
            aliases,
            flags: BuildFlags {
                chunking: build.chunking,
                preserve_modules: build.preserve_modules,
                minify: build.minify,
                external_dependencies: build.external_dependencies,
                exclude_heavy_plugins: false,
            },
            peer_packages: build.peer_packages.clone(),
            runtime_packages: build.runtime_packages.clone(),
            externalize: build.externalize.clone(),
            globals: build.globals.clone(),
            cooldown: Duration::from_millis(build.cooldown_ms),
            registry_path: project_root.join(&build.registry_file),
            engine: ToolSettings {
                program: config.engine.program.clone(),
                args: config.engine.args.clone(),
                timeout: config.engine.timeout_secs.map(Duration::from_secs),
            },
            publish: PublishSettings {
                program: config.publish.program.clone(),
                publish_args: config.publish.publish_args.clone(),
                dry_run_args: config.publish.dry_run_args.clone(),
                timeout: config.publish.timeout_secs.map(Duration::from_secs),
            },
        })
    }

    /// Set the heavy-plugin switch for this invocation.
    pub fn with_exclude_heavy_plugins(mut self, exclude: bool) -> Self {
        self.flags.exclude_heavy_plugins = exclude;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn alias_prefix(&self) -> &str {
        &self.alias_prefix
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn reserved(&self) -> &[String] {
        &self.reserved
    }

    pub fn aliases(&self) -> &[(String, PathBuf)] {
        &self.aliases
    }

    pub fn flags(&self) -> BuildFlags {
        self.flags
    }

    pub fn peer_packages(&self) -> &[String] {
        &self.peer_packages
    }

    pub fn runtime_packages(&self) -> &[String] {
        &self.runtime_packages
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    pub fn engine(&self) -> &ToolSettings {
        &self.engine
    }

    pub fn publish(&self) -> &PublishSettings {
        &self.publish
    }

    /// Source directory of a component; the source root for the aggregate.
    pub fn component_dir(&self, component: &ComponentName) -> PathBuf {
        if component.is_aggregate() {
            self.source_root.clone()
        } else {
            self.source_root.join(component.as_str())
        }
    }

    /// First existing entry file candidate for a component.
    pub fn entry_file(&self, component: &ComponentName) -> Option<PathBuf> {
        let dir = self.component_dir(component);
        self.entry_files
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Output package directory of a component.
    pub fn package_dir(&self, component: &ComponentName) -> PathBuf {
        self.output_root
            .join(component.package_dir_name(&self.namespace))
    }

    /// Check whether a package is on the peer allow-list.
    pub fn is_peer(&self, package: &str) -> bool {
        self.peer_packages.iter().any(|p| p == package)
    }

    /// Whether third-party packages are externalized for this component.
    pub fn externalizes(&self, component: &ComponentName) -> bool {
        self.flags.external_dependencies
            || self.externalize.iter().any(|c| c == component.as_str())
    }

    /// Global identifier for an externalized package.
    pub fn global_name(&self, package: &str) -> String {
        self.globals
            .get(package)
            .cloned()
            .unwrap_or_else(|| pascal_case(package))
    }

    /// Map an aliased specifier to a filesystem path.
    pub fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        for (key, dir) in &self.aliases {
            let Some(rest) = specifier.strip_prefix(key.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                return Some(dir.clone());
            }
            if key.ends_with('/') {
                return Some(dir.join(rest));
            }
            if let Some(rest) = rest.strip_prefix('/') {
                return Some(dir.join(rest));
            }
        }
        None
    }

    /// Check whether a specifier goes through the alias table.
    pub fn is_aliased(&self, specifier: &str) -> bool {
        self.resolve_alias(specifier).is_some()
    }
}

/// `element-plus` -> `ElementPlus`, `@vue/shared` -> `VueShared`.
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
