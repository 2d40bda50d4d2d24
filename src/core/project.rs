//! The served project's root `package.json`.
//!
//! Read once per run. Supplies the set of declared third-party packages and
//! the versions recorded in generated manifests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackage {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct InstalledPackage {
    version: Option<String>,
}

/// Declared packages of the project being built.
#[derive(Debug, Clone, Default)]
pub struct ProjectPackage {
    root: PathBuf,
    /// package name -> declared range; runtime deps win over dev and peer
    declared: BTreeMap<String, String>,
}

impl ProjectPackage {
    /// Load `<root>/package.json`.
    ///
    /// A missing file yields an empty declaration set: nothing third-party is
    /// then recognized as a dependency.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("package.json");
        if !path.is_file() {
            tracing::warn!("no package.json at {}, no packages declared", root.display());
            return Ok(ProjectPackage {
                root: root.to_path_buf(),
                declared: BTreeMap::new(),
            });
        }

        let contents = crate::util::fs::read_to_string(&path)?;
        let raw: RawPackage = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut declared = raw.dependencies;
        for (name, range) in raw.dev_dependencies.into_iter().chain(raw.peer_dependencies) {
            declared.entry(name).or_insert(range);
        }

        Ok(ProjectPackage {
            root: root.to_path_buf(),
            declared,
        })
    }

    /// Check whether a package is declared in any dependency section.
    pub fn is_declared(&self, package: &str) -> bool {
        self.declared.contains_key(package)
    }

    /// Version to record for a package: the installed version if one is
    /// present under `node_modules`, otherwise the declared range.
    pub fn resolved_version(&self, package: &str) -> Option<String> {
        let declared = self.declared.get(package)?;
        let installed = self
            .root
            .join("node_modules")
            .join(package)
            .join("package.json");

        let version = std::fs::read_to_string(&installed)
            .ok()
            .and_then(|s| serde_json::from_str::<InstalledPackage>(&s).ok())
            .and_then(|p| p.version);

        Some(version.unwrap_or_else(|| declared.clone()))
    }
}

/// Package name of a bare specifier, scope-aware.
///
/// `lodash-es/debounce` -> `lodash-es`, `@vue/shared/dist` -> `@vue/shared`.
/// Relative and absolute specifiers have no package name.
pub fn package_name_of(specifier: &str) -> Option<&str> {
    if specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.contains(':')
    {
        return None;
    }

    let mut slashes = specifier.match_indices('/').map(|(i, _)| i);
    let end = if specifier.starts_with('@') {
        slashes.nth(1)
    } else {
        slashes.next()
    };
    let name = &specifier[..end.unwrap_or(specifier.len())];

    if name.starts_with('@') && !name.contains('/') {
        return None;
    }
    Some(name)
}
