//! Package manifests (`package.json`) for built packages.
//!
//! [`PackageManifest`] is the typed form written after every build.
//! [`ManifestFile`] edits an existing manifest in place for the release
//! workflow, keeping unknown fields and key order intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::fs::{read_to_string, write_atomic};

/// Manifest file name inside a package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// CommonJS entry point, relative to the package directory.
pub const MAIN_ENTRY: &str = "lib/index.js";
/// ES module entry point.
pub const MODULE_ENTRY: &str = "es/index.mjs";
/// Type declarations entry, present only when declarations were emitted.
pub const TYPES_ENTRY: &str = "es/index.d.ts";
/// Stylesheet produced by the engine when a component has styles.
pub const STYLE_ENTRY: &str = "es/style.css";

/// Generated package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    pub main: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    pub exports: BTreeMap<String, ExportEntry>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

/// One entry of the `exports` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportEntry {
    Conditional {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        types: Option<String>,
        import: String,
        require: String,
    },
    Path(String),
}

fn relative(entry: &str) -> String {
    format!("./{}", entry)
}

impl PackageManifest {
    /// Manifest with both format entry points and no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut exports = BTreeMap::new();
        exports.insert(
            ".".to_string(),
            ExportEntry::Conditional {
                types: None,
                import: relative(MODULE_ENTRY),
                require: relative(MAIN_ENTRY),
            },
        );

        PackageManifest {
            name: name.into(),
            version: version.into(),
            main: MAIN_ENTRY.to_string(),
            module: MODULE_ENTRY.to_string(),
            types: None,
            exports,
            dependencies: BTreeMap::new(),
            peer_dependencies: BTreeMap::new(),
        }
    }

    /// Point `types` and the conditional export at the declarations.
    pub fn with_types(mut self) -> Self {
        self.types = Some(TYPES_ENTRY.to_string());
        if let Some(ExportEntry::Conditional { types, .. }) = self.exports.get_mut(".") {
            *types = Some(relative(TYPES_ENTRY));
        }
        self
    }

    /// Export the stylesheet as `./style.css`.
    pub fn with_style(mut self) -> Self {
        self.exports.insert(
            "./style.css".to_string(),
            ExportEntry::Path(relative(STYLE_ENTRY)),
        );
        self
    }

    /// Serialize as pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        json.push('\n');
        Ok(json)
    }

    /// Write atomically, replacing any existing manifest.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_json()?)
    }
}

/// An existing manifest opened for editing.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    value: Value,
}

impl ManifestFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if !value.is_object() {
            bail!("{} is not a JSON object", path.display());
        }
        Ok(ManifestFile {
            path: path.to_path_buf(),
            value,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.value.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.value
            .get("version")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_private(&self) -> bool {
        self.value
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_version(&mut self, version: &str) {
        if let Some(map) = self.value.as_object_mut() {
            map.insert("version".to_string(), Value::String(version.to_string()));
        }
    }

    /// Write the edited manifest back atomically.
    pub fn save(&self) -> Result<()> {
        let mut json =
            serde_json::to_string_pretty(&self.value).context("failed to serialize manifest")?;
        json.push('\n');
        write_atomic(&self.path, &json)
    }
}
