//! Per-component version registry.
//!
//! A flat JSON object mapping registry keys to semver strings, two-space
//! indented with a trailing newline. The whole file is read, merged and
//! rewritten on every update, so concurrent runs must be serialized by the
//! caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use semver::Version;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::util::fs::write_atomic;

/// Version assumed for a component that has never been recorded.
pub const DEFAULT_VERSION: &str = "0.0.1";

/// The baseline [`DEFAULT_VERSION`] as a parsed version.
pub fn default_version() -> Version {
    Version::new(0, 0, 1)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid bump type `{0}`, expected `major`, `minor` or `patch`")]
    InvalidBumpKind(String),
}

/// Which version segment to increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BumpKind {
    Major,
    Minor,
    #[default]
    Patch,
}

impl FromStr for BumpKind {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(BumpKind::Major),
            "minor" => Ok(BumpKind::Minor),
            "patch" => Ok(BumpKind::Patch),
            other => Err(VersionError::InvalidBumpKind(other.to_string())),
        }
    }
}

/// Next version for a bump. Pre-release and build metadata are dropped.
pub fn bump_version(version: &Version, kind: BumpKind) -> Version {
    match kind {
        BumpKind::Major => Version::new(version.major + 1, 0, 0),
        BumpKind::Minor => Version::new(version.major, version.minor + 1, 0),
        BumpKind::Patch => Version::new(version.major, version.minor, version.patch + 1),
    }
}

/// Handle to the version registry file.
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    path: PathBuf,
}

impl VersionRegistry {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        VersionRegistry { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all recorded versions, creating an empty registry if absent.
    ///
    /// Non-string entries are ignored.
    pub fn read(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(v) => Some((key, v)),
                _ => None,
            })
            .collect())
    }

    /// Recorded version for `key`, or `baseline` when missing or unparsable.
    pub fn version_of(&self, key: &str, baseline: &Version) -> Result<Version> {
        let entries = self.load()?;
        Ok(parse_entry(&entries, key).unwrap_or_else(|| baseline.clone()))
    }

    /// Bump the version for `key` and persist the merged registry.
    pub fn bump(&self, key: &str, kind: BumpKind, baseline: &Version) -> Result<Version> {
        let mut entries = self.load()?;
        let current = parse_entry(&entries, key).unwrap_or_else(|| baseline.clone());
        let next = bump_version(&current, kind);

        entries.insert(key.to_string(), Value::String(next.to_string()));
        self.store(&entries)?;

        tracing::debug!("bumped {} from {} to {}", key, current, next);
        Ok(next)
    }

    /// Record an explicit version for `key`, keeping every other entry.
    pub fn set(&self, key: &str, version: &Version) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), Value::String(version.to_string()));
        self.store(&entries)
    }

    /// Raw recorded string for `key`, valid or not.
    pub fn entry(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Put back an entry captured with [`entry`](Self::entry). `None`
    /// removes the key.
    pub fn restore(&self, key: &str, previous: Option<&str>) -> Result<()> {
        let mut entries = self.load()?;
        match previous {
            Some(raw) => {
                entries.insert(key.to_string(), Value::String(raw.to_string()));
            }
            None => {
                entries.remove(key);
            }
        }
        self.store(&entries)
    }

    /// Find the recorded key matching `name` case-insensitively.
    pub fn find_key(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            let empty = Map::new();
            self.store(&empty)?;
            return Ok(empty);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read version registry {}", self.path.display()))?;
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!(
                    "version registry {} is corrupt, starting from an empty registry",
                    self.path.display()
                );
                Ok(Map::new())
            }
        }
    }

    fn store(&self, entries: &Map<String, Value>) -> Result<()> {
        let mut json = serde_json::to_string_pretty(entries)
            .context("failed to serialize version registry")?;
        json.push('\n');
        write_atomic(&self.path, &json)
    }
}

fn parse_entry(entries: &Map<String, Value>, key: &str) -> Option<Version> {
    let raw = entries.get(key)?.as_str()?;
    match Version::parse(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("ignoring invalid version `{}` for {}: {}", raw, key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_bump_rules() {
        assert_eq!(bump_version(&v("1.2.3"), BumpKind::Patch), v("1.2.4"));
        assert_eq!(bump_version(&v("1.2.3"), BumpKind::Minor), v("1.3.0"));
        assert_eq!(bump_version(&v("1.2.3"), BumpKind::Major), v("2.0.0"));
        assert_eq!(bump_version(&v("1.2.3-beta.1"), BumpKind::Patch), v("1.2.4"));
    }

    #[test]
    fn test_bump_kind_parse() {
        assert_eq!("minor".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!(
            "huge".parse::<BumpKind>().unwrap_err(),
            VersionError::InvalidBumpKind("huge".into())
        );
    }

    #[test]
    fn test_read_creates_empty_registry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build/versions.json");
        let registry = VersionRegistry::open(&path);

        assert!(registry.read().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_bump_preserves_other_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, "{\n  \"Select\": \"1.0.0\",\n  \"ArrayBase\": \"0.2.9\"\n}\n").unwrap();
        let registry = VersionRegistry::open(&path);

        let next = registry
            .bump("ArrayBase", BumpKind::Patch, &default_version())
            .unwrap();
        assert_eq!(next, v("0.2.10"));

        let entries = registry.read().unwrap();
        assert_eq!(entries["Select"], "1.0.0");
        assert_eq!(entries["ArrayBase"], "0.2.10");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"Select\": \"1.0.0\",\n  \"ArrayBase\": \"0.2.10\"\n}\n"
        );
    }

    #[test]
    fn test_missing_entry_uses_baseline() {
        let tmp = TempDir::new().unwrap();
        let registry = VersionRegistry::open(tmp.path().join("versions.json"));

        assert_eq!(
            registry.version_of("Slider", &default_version()).unwrap(),
            v(DEFAULT_VERSION)
        );
        let next = registry
            .bump("Slider", BumpKind::Minor, &default_version())
            .unwrap();
        assert_eq!(next, v("0.1.0"));
    }

    #[test]
    fn test_corrupt_registry_is_treated_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, "{ not json").unwrap();
        let registry = VersionRegistry::open(&path);

        assert!(registry.read().unwrap().is_empty());
        registry.set("Select", &v("2.0.0")).unwrap();
        assert_eq!(registry.read().unwrap()["Select"], "2.0.0");
    }

    #[test]
    fn test_invalid_entry_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, r#"{"Select": "latest"}"#).unwrap();
        let registry = VersionRegistry::open(&path);

        assert_eq!(
            registry.version_of("Select", &v("0.0.1")).unwrap(),
            v("0.0.1")
        );
    }

    #[test]
    fn test_restore_puts_back_previous_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, "{\n  \"Select\": \"1.0.0\"\n}\n").unwrap();
        let registry = VersionRegistry::open(&path);
        let before = registry.read().unwrap();

        let select = registry.entry("Select").unwrap();
        let slider = registry.entry("Slider").unwrap();
        assert_eq!(select.as_deref(), Some("1.0.0"));
        assert_eq!(slider, None);

        registry.set("Select", &v("1.0.1")).unwrap();
        registry.set("Slider", &v("0.0.2")).unwrap();
        registry.restore("Select", select.as_deref()).unwrap();
        registry.restore("Slider", slider.as_deref()).unwrap();

        assert_eq!(registry.read().unwrap(), before);
    }

    #[test]
    fn test_find_key_ignores_case() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, r#"{"ArrayBase": "1.0.0"}"#).unwrap();
        let registry = VersionRegistry::open(&path);

        assert_eq!(
            registry.find_key("arraybase").unwrap().as_deref(),
            Some("ArrayBase")
        );
        assert_eq!(registry.find_key("select").unwrap(), None);
    }
}
