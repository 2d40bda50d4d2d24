//! Staged, rewritten copies of the source tree.
//!
//! The engine runs in its own process, so imports are rewritten ahead of
//! time: the source root is copied into a scratch directory under the output
//! root and every script file is passed through the [`ImportRewriter`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::analyzer::resolve::is_script;
use crate::rewrite::ImportRewriter;
use crate::util::fs::{ensure_dir, normalize_path};

const STAGE_PREFIX: &str = ".kitpack-stage-";

/// A staged source tree. Removed when dropped.
#[derive(Debug)]
pub struct StagedSources {
    dir: TempDir,
    source_root: PathBuf,
    files_rewritten: usize,
    replacements: usize,
}

impl StagedSources {
    /// Scratch directory holding the staged tree.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Root of the staged copy of the source root.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn files_rewritten(&self) -> usize {
        self.files_rewritten
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    /// Map a path under the original source root into the staged tree.
    /// Paths elsewhere are returned unchanged.
    pub fn map_path(&self, original: &Path) -> PathBuf {
        match normalize_path(original).strip_prefix(&self.source_root) {
            Ok(rel) => self.root().join(rel),
            Err(_) => original.to_path_buf(),
        }
    }

    /// Alias table pointing into the staged tree.
    pub fn map_aliases(&self, aliases: &[(String, PathBuf)]) -> BTreeMap<String, PathBuf> {
        aliases
            .iter()
            .map(|(key, dir)| (key.clone(), self.map_path(dir)))
            .collect()
    }
}

/// Copy the source root under `scratch_parent` and rewrite every script.
pub fn stage_sources(
    source_root: &Path,
    scratch_parent: &Path,
    rewriter: &ImportRewriter<'_>,
) -> Result<StagedSources> {
    ensure_dir(scratch_parent)?;
    let dir = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .tempdir_in(scratch_parent)
        .with_context(|| format!("failed to create staging directory in {}", scratch_parent.display()))?;

    let mut staged = StagedSources {
        dir,
        source_root: normalize_path(source_root),
        files_rewritten: 0,
        replacements: 0,
    };
    let staged_root = staged.root();

    let walker = WalkDir::new(source_root)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let name = e.file_name().to_string_lossy();
                name != "node_modules" && !name.starts_with(STAGE_PREFIX)
            }
        });
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", source_root.display()))?;
        let rel = entry
            .path()
            .strip_prefix(source_root)
            .with_context(|| format!("{} escapes the source root", entry.path().display()))?;
        let dest = staged_root.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&dest)?;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        if is_script(entry.path()) {
            let source = std::fs::read_to_string(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            let out = rewriter.rewrite(&source, entry.path());
            if out.changed() {
                staged.files_rewritten += 1;
                staged.replacements += out.replacements.len();
            }
            std::fs::write(&dest, out.code)
                .with_context(|| format!("failed to write {}", dest.display()))?;
        } else {
            std::fs::copy(entry.path(), &dest).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), dest.display())
            })?;
        }
    }

    tracing::debug!(
        "staged {} in {}: {} files rewritten, {} imports",
        source_root.display(),
        staged.dir().display(),
        staged.files_rewritten,
        staged.replacements
    );
    Ok(staged)
}
