//! Component names and the package identities derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry key used for the aggregate library.
///
/// Underscore-prefixed directories are never components, so this key cannot
/// collide with a real component name.
pub const AGGREGATE_KEY: &str = "_library";

/// A component directory name. The empty name is the aggregate library.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentName(String);

impl ComponentName {
    /// Create a component name.
    pub fn new(name: impl Into<String>) -> Self {
        ComponentName(name.into())
    }

    /// The aggregate "whole library" pseudo-component.
    pub fn aggregate() -> Self {
        ComponentName(String::new())
    }

    /// Check whether this is the aggregate library.
    pub fn is_aggregate(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the raw directory name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which this component's version is recorded.
    pub fn registry_key(&self) -> &str {
        if self.is_aggregate() {
            AGGREGATE_KEY
        } else {
            &self.0
        }
    }

    /// Output directory name for the built package.
    pub fn package_dir_name(&self, namespace: &str) -> String {
        if self.is_aggregate() {
            namespace.to_string()
        } else {
            self.0.to_lowercase()
        }
    }

    /// Published package name: `@<namespace>/<lowercased name>`, or the bare
    /// namespace for the aggregate.
    pub fn package_name(&self, namespace: &str) -> String {
        if self.is_aggregate() {
            namespace.to_string()
        } else {
            format!("@{}/{}", namespace, self.0.to_lowercase())
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_aggregate() {
            write!(f, "library")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for ComponentName {
    fn from(s: &str) -> Self {
        ComponentName::new(s)
    }
}
