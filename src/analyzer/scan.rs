//! Supplementary pattern scan over a component's source tree.
//!
//! The import graph only sees what is reachable from the entry file. This
//! pass walks every script under the component directory, plus every shared
//! file reached from there, and matches import statements textually. It
//! catches files the entry never imports and references the parser cannot
//! see, such as imports inside code that fails to parse.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use super::resolve::{is_script, ImportTarget, Location, ModuleResolver};
use crate::core::component::ComponentName;

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^.\w$])(?:import|export)\s+(?:type\s+)?(?:[\w$*{}\s,]+\s+from\s+)?['"]([^'"\n]+)['"]|(?:^|[^.\w$])(?:import|require)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#,
    )
    .unwrap()
});

/// Specifiers matched by the import pattern, in source order.
pub fn scan_specifiers(source: &str) -> Vec<String> {
    IMPORT_PATTERN
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// What the scan found.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub components: BTreeSet<ComponentName>,
    pub packages: BTreeSet<String>,
    pub files_scanned: usize,
}

/// Script files under `root`, skipping hidden directories and `node_modules`.
fn script_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || {
                let name = e.file_name().to_string_lossy();
                !(e.file_type().is_dir() && (name.starts_with('.') || name == "node_modules"))
            }
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable path during scan: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_script(e.path()))
        .map(|e| e.into_path())
        .collect()
}

/// Scan `owner`'s directory and the shared files it reaches, transitively.
pub fn scan_component(resolver: &ModuleResolver<'_>, owner: &ComponentName) -> ScanResult {
    let mut result = ScanResult::default();

    let mut roots = VecDeque::from([resolver.ctx().component_dir(owner)]);
    let mut seen_roots: HashSet<PathBuf> = roots.iter().cloned().collect();
    let mut scanned: HashSet<PathBuf> = HashSet::new();

    while let Some(root) = roots.pop_front() {
        for file in script_files(&root) {
            if !scanned.insert(file.clone()) {
                continue;
            }
            let source = match std::fs::read_to_string(&file) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("skipping unreadable file {}: {}", file.display(), e);
                    continue;
                }
            };
            result.files_scanned += 1;

            for specifier in scan_specifiers(&source) {
                let target = match resolver.classify(&specifier, &file) {
                    ImportTarget::Local(target) => target,
                    ImportTarget::Package(name) => {
                        result.packages.insert(name);
                        continue;
                    }
                    ImportTarget::Unknown => continue,
                };

                let next_root = match resolver.locate(&target) {
                    Location::Component(c) if owner.is_aggregate() || &c == owner => None,
                    Location::Component(c) => {
                        tracing::debug!("scan: {} reaches component {}", file.display(), c);
                        result.components.insert(c);
                        None
                    }
                    // only the imported file, its own imports are followed in turn
                    Location::Shared | Location::Root if target.is_file() && is_script(&target) => {
                        Some(target)
                    }
                    Location::Shared | Location::Root | Location::Outside => None,
                };

                if let Some(next) = next_root {
                    if seen_roots.insert(next.clone()) {
                        roots.push_back(next);
                    }
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::ProjectFixture;

    #[test]
    fn test_scan_specifiers() {
        let source = r#"
import Vue from 'vue'
import {
  a,
  b,
} from "../ArrayBase"
import type { T } from './types'
import './style.css'
export * from './shared'
const m = await import('./lazy')
const r = require("echarts")
export const notAnImport = 'x'
obj.import('ignored')
"#;
        assert_eq!(
            scan_specifiers(source),
            vec![
                "vue",
                "../ArrayBase",
                "./types",
                "./style.css",
                "./shared",
                "./lazy",
                "echarts"
            ]
        );
    }

    #[test]
    fn test_scan_finds_unreachable_files_and_escapes() {
        let fixture = ProjectFixture::new()
            .component("ArrayBase", "")
            .component("ArrayCards", "export const cards = 1\n")
            // never imported from the entry
            .file(
                "src/ArrayCards/extra/Orphan.ts",
                "import { base } from '../../ArrayBase/hooks'\nimport dayjs from 'dayjs'\n",
            )
            .file("src/ArrayCards/node_modules/x/index.js", "import '../../../Select'\n")
            .component("Select", "");
        let ctx = fixture.context();
        let components = fixture.components();
        let resolver = ModuleResolver::new(&ctx, &components);

        let result = scan_component(&resolver, &ComponentName::new("ArrayCards"));
        let names: Vec<&str> = result.components.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["ArrayBase"]);
        assert!(result.packages.contains("dayjs"));
        assert_eq!(result.files_scanned, 2);
    }

    #[test]
    fn test_unimported_shared_file_is_not_scanned() {
        let fixture = ProjectFixture::new()
            .component("Slider", "import { clamp } from '@form-kit/_utils/math'\n")
            .file("src/_utils/math.ts", "export const clamp = 1\n")
            .file("src/_utils/format.ts", "import { Select } from '../Select'\n")
            .component("Select", "");
        let ctx = fixture.context();
        let components = fixture.components();
        let resolver = ModuleResolver::new(&ctx, &components);

        let result = scan_component(&resolver, &ComponentName::new("Slider"));
        assert!(result.components.is_empty());
        assert_eq!(result.files_scanned, 2);
    }

    #[test]
    fn test_shared_imports_are_followed_transitively() {
        let fixture = ProjectFixture::new()
            .component("Slider", "import { clamp } from '@form-kit/_utils/math'\n")
            .file("src/_utils/math.ts", "export { fmt } from './format'\nexport const clamp = 1\n")
            .file("src/_utils/format.ts", "import { Select } from '../Select'\n")
            .file("src/_utils/unused.ts", "import { base } from '../ArrayBase'\n")
            .component("ArrayBase", "")
            .component("Select", "");
        let ctx = fixture.context();
        let components = fixture.components();
        let resolver = ModuleResolver::new(&ctx, &components);

        let result = scan_component(&resolver, &ComponentName::new("Slider"));
        let names: Vec<&str> = result.components.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["Select"]);
        assert_eq!(result.files_scanned, 3);
    }

    #[test]
    fn test_self_reference_is_not_a_component() {
        let fixture = ProjectFixture::new()
            .component("Slider", "import { fmt } from '@form-kit/Slider/utils'\n")
            .file("src/Slider/utils.ts", "export const fmt = 1\n");
        let ctx = fixture.context();
        let components = fixture.components();
        let resolver = ModuleResolver::new(&ctx, &components);

        let result = scan_component(&resolver, &ComponentName::new("Slider"));
        assert!(result.components.is_empty());
    }
}
