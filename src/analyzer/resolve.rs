//! Specifier resolution and classification.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::component::ComponentName;
use crate::core::context::BuildContext;
use crate::core::project::package_name_of;
use crate::util::fs::normalize_path;

/// Extensions whose files are scanned for imports.
pub const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "vue"];

/// Extensions probed when a specifier omits one, in order.
const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "vue", "json"];

/// Check whether a file is a script source.
pub fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

/// Check whether a specifier is written relative to the importing file.
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// What an import refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A file or directory in the project (probed when it exists)
    Local(PathBuf),
    /// A third-party package, by package name
    Package(String),
    Unknown,
}

/// Where a local path sits relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Inside a component directory
    Component(ComponentName),
    /// Inside a non-component directory under the source root
    Shared,
    /// Directly in the source root
    Root,
    /// Outside the source root
    Outside,
}

/// Resolves specifiers against the file system and the alias table.
#[derive(Debug, Clone, Copy)]
pub struct ModuleResolver<'a> {
    ctx: &'a BuildContext,
    components: &'a BTreeSet<ComponentName>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(ctx: &'a BuildContext, components: &'a BTreeSet<ComponentName>) -> Self {
        ModuleResolver { ctx, components }
    }

    pub fn ctx(&self) -> &'a BuildContext {
        self.ctx
    }

    /// Lexical target of a relative or aliased specifier, without probing.
    pub fn local_path(&self, specifier: &str, importer: &Path) -> Option<PathBuf> {
        if is_relative(specifier) {
            let dir = importer.parent().unwrap_or(Path::new(""));
            return Some(normalize_path(&dir.join(specifier)));
        }
        self.ctx
            .resolve_alias(specifier)
            .map(|path| normalize_path(&path))
    }

    /// Find the file a module path refers to.
    ///
    /// Tries the path itself, then each extension, then `index.*` inside it.
    pub fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        for ext in PROBE_EXTENSIONS {
            let mut candidate = OsString::from(path.as_os_str());
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if path.is_dir() {
            for ext in PROBE_EXTENSIONS {
                let candidate = path.join(format!("index.{}", ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Classify a specifier found in `importer`.
    pub fn classify(&self, specifier: &str, importer: &Path) -> ImportTarget {
        if let Some(path) = self.local_path(specifier, importer) {
            let resolved = self.resolve_file(&path).unwrap_or(path);
            return ImportTarget::Local(resolved);
        }
        match package_name_of(specifier) {
            Some(name) => ImportTarget::Package(name.to_string()),
            None => ImportTarget::Unknown,
        }
    }

    /// Locate a path relative to the source root and its components.
    pub fn locate(&self, path: &Path) -> Location {
        let Ok(rel) = path.strip_prefix(self.ctx.source_root()) else {
            return Location::Outside;
        };
        let mut parts = rel.components();
        let Some(first) = parts.next() else {
            return Location::Root;
        };
        let name = first.as_os_str().to_string_lossy();

        match self.component_named(&name) {
            Some(component) => Location::Component(component),
            // a file directly under the root, e.g. `src/index.ts`
            None if parts.next().is_none() && !path.is_dir() => Location::Root,
            None => Location::Shared,
        }
    }

    /// Look up a component by directory name.
    ///
    /// Falls back to a case-insensitive match so published-style references
    /// (`@ns/arraybase`) land on the right component.
    pub fn component_named(&self, name: &str) -> Option<ComponentName> {
        let name = name.trim_end_matches(|c| c == '/');
        self.components
            .iter()
            .find(|c| c.as_str() == name)
            .or_else(|| {
                self.components
                    .iter()
                    .find(|c| c.as_str().eq_ignore_ascii_case(name))
            })
            .cloned()
    }
}
