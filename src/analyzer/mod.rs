//! Dependency analysis for components.
//!
//! Two passes run per component and their results are merged by union:
//! an import graph rooted at the entry file ([`graph`]) and a textual scan
//! of the whole component tree ([`scan`]). Neither pass takes precedence.

pub mod graph;
pub mod imports;
pub mod resolve;
pub mod scan;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::component::ComponentName;
use crate::core::context::BuildContext;
use crate::core::project::ProjectPackage;

pub use graph::ImportGraph;
pub use resolve::{ImportTarget, Location, ModuleResolver};

/// Dependencies of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDependencies {
    /// Sibling components, sorted
    pub internal: BTreeSet<ComponentName>,
    /// Bundled-or-externalized third-party packages -> version
    pub external: BTreeMap<String, String>,
    /// Packages supplied by the consumer -> version
    pub peer_dependencies: BTreeMap<String, String>,
}

impl ComponentDependencies {
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty() && self.peer_dependencies.is_empty()
    }
}

/// Computes [`ComponentDependencies`] for the components of one run.
#[derive(Debug)]
pub struct DependencyAnalyzer<'a> {
    ctx: &'a BuildContext,
    project: &'a ProjectPackage,
    components: &'a BTreeSet<ComponentName>,
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(
        ctx: &'a BuildContext,
        project: &'a ProjectPackage,
        components: &'a BTreeSet<ComponentName>,
    ) -> Self {
        DependencyAnalyzer {
            ctx,
            project,
            components,
        }
    }

    /// Analyze a component. Never fails: a pass that cannot run is logged
    /// and contributes nothing.
    pub fn analyze(&self, component: &ComponentName) -> ComponentDependencies {
        let resolver = ModuleResolver::new(self.ctx, self.components);
        let mut reached = BTreeSet::new();
        let mut packages = BTreeSet::new();

        match self.ctx.entry_file(component) {
            Some(entry) => match ImportGraph::build(&resolver, component, &entry) {
                Ok(graph) => {
                    tracing::debug!("{}: {} modules reachable from entry", component, graph.module_count());
                    reached.extend(graph.reached_components().iter().cloned());
                    packages.extend(graph.packages().iter().cloned());
                }
                Err(e) => tracing::warn!("import graph for {} failed: {:#}", component, e),
            },
            None => tracing::warn!("no entry file for {}, skipping import graph", component),
        }

        let scan = scan::scan_component(&resolver, component);
        tracing::debug!("scanned {} files for {}", scan.files_scanned, component);
        reached.extend(scan.components);
        packages.extend(scan.packages);

        self.classify(component, reached, packages)
    }

    fn classify(
        &self,
        component: &ComponentName,
        reached: BTreeSet<ComponentName>,
        packages: BTreeSet<String>,
    ) -> ComponentDependencies {
        let mut deps = ComponentDependencies::default();

        if !component.is_aggregate() {
            deps.internal = reached
                .into_iter()
                .filter(|c| c != component && self.components.contains(c))
                .collect();
        }

        for package in packages {
            let Some(version) = self.project.resolved_version(&package) else {
                tracing::debug!("{}: `{}` is not a declared dependency", component, package);
                continue;
            };
            if self.ctx.is_peer(&package) {
                deps.peer_dependencies.insert(package, version);
            } else {
                deps.external.insert(package, version);
            }
        }

        if !self.ctx.externalizes(component) {
            deps.external.clear();
        }

        tracing::info!(
            "{}: {} internal, {} external, {} peer",
            component,
            deps.internal.len(),
            deps.external.len(),
            deps.peer_dependencies.len()
        );
        deps
    }
}
