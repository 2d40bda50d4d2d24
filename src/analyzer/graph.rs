//! Module-level import graph rooted at a component entry.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};

use super::imports::{extract_imports_for, ImportKind};
use super::resolve::{is_script, ImportTarget, Location, ModuleResolver};
use crate::core::component::ComponentName;

/// Import graph of the modules reachable from one entry file.
///
/// Nodes are files; edges are imports labelled with their kind. Traversal
/// follows the owning component, shared subtrees and root-level files;
/// other components are recorded but not entered. The aggregate library
/// owns every component, so it enters all of them and records none.
#[derive(Debug)]
pub struct ImportGraph {
    graph: DiGraph<PathBuf, ImportKind>,
    index: HashMap<PathBuf, NodeIndex>,
    components: BTreeSet<ComponentName>,
    packages: BTreeSet<String>,
}

impl ImportGraph {
    /// Build the graph from `entry`. Fails only if the entry is unreadable.
    pub fn build(
        resolver: &ModuleResolver<'_>,
        owner: &ComponentName,
        entry: &Path,
    ) -> Result<Self> {
        let mut graph = ImportGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
            components: BTreeSet::new(),
            packages: BTreeSet::new(),
        };

        let entry_source = std::fs::read_to_string(entry)
            .with_context(|| format!("failed to read entry file {}", entry.display()))?;

        let root = graph.node(entry);
        let mut queue = VecDeque::from([(root, entry.to_path_buf(), Some(entry_source))]);

        while let Some((from, file, source)) = queue.pop_front() {
            let source = match source {
                Some(source) => source,
                None => match std::fs::read_to_string(&file) {
                    Ok(source) => source,
                    Err(e) => {
                        tracing::warn!("skipping unreadable module {}: {}", file.display(), e);
                        continue;
                    }
                },
            };

            for import in extract_imports_for(&file, &source) {
                match resolver.classify(&import.specifier, &file) {
                    ImportTarget::Local(target) => {
                        let follow = match resolver.locate(&target) {
                            Location::Component(_) if owner.is_aggregate() => true,
                            Location::Component(c) if &c == owner => true,
                            Location::Component(c) => {
                                tracing::debug!("{} imports component {}", file.display(), c);
                                graph.components.insert(c);
                                false
                            }
                            Location::Shared | Location::Root => true,
                            Location::Outside => false,
                        };
                        if !follow || !target.is_file() || !is_script(&target) {
                            continue;
                        }

                        let seen = graph.index.contains_key(&target);
                        let to = graph.node(&target);
                        graph.graph.add_edge(from, to, import.kind);
                        if !seen {
                            queue.push_back((to, target, None));
                        }
                    }
                    ImportTarget::Package(name) => {
                        graph.packages.insert(name);
                    }
                    ImportTarget::Unknown => {}
                }
            }
        }

        tracing::debug!(
            "import graph for {}: {} modules, {} edges",
            owner,
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        Ok(graph)
    }

    fn node(&mut self, path: &Path) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_path_buf());
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    /// Components imported from the traversed modules.
    pub fn reached_components(&self) -> &BTreeSet<ComponentName> {
        &self.components
    }

    /// Package names imported from the traversed modules.
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }
}
