//! Component discovery under the source root.

use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::core::component::ComponentName;
use crate::core::context::BuildContext;

/// Enumerate component directories one level below the source root.
///
/// Hidden (`.`) and internal (`_`) directories, reserved names and the
/// namespace directory itself are excluded.
pub fn discover_components(ctx: &BuildContext) -> Result<BTreeSet<ComponentName>> {
    let root = ctx.source_root();
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("failed to read source root: {}", root.display()))?;

    let mut components = BTreeSet::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read source root: {}", root.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!("skipping non-UTF-8 directory {}", entry.path().display());
            continue;
        };
        if is_excluded(ctx, &name) {
            tracing::debug!("not a component: {}", name);
            continue;
        }
        components.insert(ComponentName::new(name));
    }

    tracing::debug!("discovered {} components", components.len());
    Ok(components)
}

fn is_excluded(ctx: &BuildContext, name: &str) -> bool {
    name.starts_with('.')
        || name.starts_with('_')
        || name == ctx.namespace()
        || ctx.reserved().iter().any(|r| r == name)
}
