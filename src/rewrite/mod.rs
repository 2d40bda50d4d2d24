//! Import rewriting for isolated component builds.
//!
//! A component built on its own must reach its siblings through their
//! published packages, and must reach itself through relative paths so the
//! bundle stays closed. [`ImportRewriter`] edits module specifiers in place;
//! everything else in the file is left byte-for-byte intact.

use std::collections::BTreeSet;
use std::path::Path;

use crate::analyzer::imports::extract_imports_for;
use crate::analyzer::resolve::{is_relative, Location, ModuleResolver};
use crate::core::component::ComponentName;
use crate::core::context::BuildContext;
use crate::util::fs::{relative_path, to_slash};

/// One specifier change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReplacement {
    pub original: String,
    pub rewritten: String,
    pub target_component: ComponentName,
    pub is_self_reference: bool,
}

/// Output of rewriting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub code: String,
    pub replacements: Vec<ImportReplacement>,
}

impl Rewritten {
    pub fn changed(&self) -> bool {
        !self.replacements.is_empty()
    }
}

/// Rewrites imports for the build of one component.
#[derive(Debug)]
pub struct ImportRewriter<'a> {
    ctx: &'a BuildContext,
    resolver: ModuleResolver<'a>,
    component: &'a ComponentName,
    internal: &'a BTreeSet<ComponentName>,
}

impl<'a> ImportRewriter<'a> {
    /// `internal` is the set of siblings that may be rewritten. For the
    /// aggregate library pass every component.
    pub fn new(
        ctx: &'a BuildContext,
        components: &'a BTreeSet<ComponentName>,
        component: &'a ComponentName,
        internal: &'a BTreeSet<ComponentName>,
    ) -> Self {
        ImportRewriter {
            ctx,
            resolver: ModuleResolver::new(ctx, components),
            component,
            internal,
        }
    }

    /// Rewrite the specifiers of `source`, which lives at `file`.
    pub fn rewrite(&self, source: &str, file: &Path) -> Rewritten {
        let mut code = String::with_capacity(source.len());
        let mut replacements = Vec::new();
        let mut last = 0;

        for import in extract_imports_for(file, source) {
            let Some(replacement) = self.replacement_for(&import.specifier, file) else {
                continue;
            };
            if replacement.rewritten == import.specifier {
                continue;
            }
            code.push_str(&source[last..import.span.start]);
            code.push_str(&replacement.rewritten);
            last = import.span.end;
            replacements.push(replacement);
        }
        code.push_str(&source[last..]);

        for r in &replacements {
            tracing::debug!("{}: `{}` -> `{}`", file.display(), r.original, r.rewritten);
        }
        Rewritten { code, replacements }
    }

    fn replacement_for(&self, specifier: &str, file: &Path) -> Option<ImportReplacement> {
        let relative = is_relative(specifier);
        if !relative && !self.ctx.is_aliased(specifier) {
            // third-party
            return None;
        }

        let target = self.resolver.local_path(specifier, file)?;
        let Location::Component(target_component) = self.resolver.locate(&target) else {
            // shared subtrees and root files are inlined untouched
            return None;
        };

        let replacement = |rewritten: String, is_self_reference: bool| ImportReplacement {
            original: specifier.to_string(),
            rewritten,
            target_component: target_component.clone(),
            is_self_reference,
        };

        let is_self = !self.component.is_aggregate() && &target_component == self.component;
        if is_self {
            if relative {
                return None;
            }
            let from = file.parent().unwrap_or(Path::new(""));
            return Some(replacement(relative_specifier(from, &target), true));
        }

        if !self.internal.contains(&target_component) {
            return None;
        }

        if self.component.is_aggregate() {
            if !relative {
                return None;
            }
            let dir = self.ctx.component_dir(&target_component);
            let rest = target.strip_prefix(&dir).map(to_slash).unwrap_or_default();
            let mut alias = format!("{}/{}", self.ctx.alias_prefix(), target_component.as_str());
            if !rest.is_empty() {
                alias.push('/');
                alias.push_str(&rest);
            }
            return Some(replacement(alias, false));
        }

        Some(replacement(
            target_component.package_name(self.ctx.namespace()),
            false,
        ))
    }
}

/// Specifier for `target` as seen from directory `from`.
fn relative_specifier(from: &Path, target: &Path) -> String {
    let rel = to_slash(&relative_path(from, target));
    if rel.is_empty() {
        ".".to_string()
    } else if rel == ".." || rel.starts_with("../") {
        rel
    } else {
        format!("./{}", rel)
    }
}
