//! Externalization rules and global bindings for one build.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::analyzer::resolve::is_relative;
use crate::analyzer::ComponentDependencies;
use crate::core::component::ComponentName;
use crate::core::context::{pascal_case, BuildContext};
use crate::core::project::package_name_of;

/// Decides which imports the engine leaves unbundled.
///
/// Serialized into the engine job so the engine-side configuration applies
/// exactly the same predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRules {
    /// Runtime and peer packages, external together with their subpaths
    pub always: BTreeSet<String>,
    /// Published names of sibling components
    pub siblings: BTreeSet<String>,
    /// Package name of the component being built
    pub self_package: String,
    /// Alias prefixes, resolved to sources and never external
    pub aliases: Vec<String>,
    /// Whether any other third-party package is external
    pub third_party: bool,
}

impl ExternalRules {
    pub fn for_component(
        ctx: &BuildContext,
        components: &BTreeSet<ComponentName>,
        component: &ComponentName,
    ) -> Self {
        let always = ctx
            .runtime_packages()
            .iter()
            .chain(ctx.peer_packages())
            .cloned()
            .collect();

        // the aggregate bundles every component
        let siblings = if component.is_aggregate() {
            BTreeSet::new()
        } else {
            components
                .iter()
                .filter(|c| *c != component)
                .map(|c| c.package_name(ctx.namespace()))
                .collect()
        };

        ExternalRules {
            always,
            siblings,
            self_package: component.package_name(ctx.namespace()),
            aliases: ctx.aliases().iter().map(|(key, _)| key.clone()).collect(),
            third_party: ctx.externalizes(component),
        }
    }

    fn is_alias(&self, specifier: &str) -> bool {
        self.aliases.iter().any(|key| {
            specifier
                .strip_prefix(key.as_str())
                .is_some_and(|rest| rest.is_empty() || key.ends_with('/') || rest.starts_with('/'))
        })
    }

    /// Check whether an import stays out of the bundle.
    pub fn is_external(&self, specifier: &str) -> bool {
        if is_relative(specifier) || specifier.starts_with('/') {
            return false;
        }
        let package = package_name_of(specifier);

        // sibling packages share the alias prefix, so test them first
        if let Some(name) = package {
            if name == self.self_package {
                return false;
            }
            if self.siblings.contains(name) {
                return true;
            }
        }
        if self.is_alias(specifier) {
            return false;
        }
        match package {
            Some(name) if self.always.contains(name) => true,
            Some(_) => self.third_party,
            None => false,
        }
    }
}

/// Global identifiers for externalized modules.
///
/// Runtime and peer packages use the configured table (PascalCase by
/// default); each internal dependency maps its package reference to
/// `<PascalNamespace><Name>`.
pub fn compute_globals(
    ctx: &BuildContext,
    component: &ComponentName,
    deps: &ComponentDependencies,
) -> BTreeMap<String, String> {
    let mut globals = BTreeMap::new();

    let packages = ctx
        .runtime_packages()
        .iter()
        .chain(ctx.peer_packages())
        .chain(deps.peer_dependencies.keys())
        .chain(deps.external.keys());
    for package in packages {
        globals.insert(package.clone(), ctx.global_name(package));
    }

    let prefix = pascal_case(ctx.namespace());
    for dep in deps.internal.iter().filter(|d| *d != component) {
        globals.insert(
            dep.package_name(ctx.namespace()),
            format!("{}{}", prefix, pascal_case(dep.as_str())),
        );
    }

    globals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::ProjectFixture;

    fn rules(fixture: &ProjectFixture, component: &str) -> ExternalRules {
        let ctx = fixture.context();
        ExternalRules::for_component(&ctx, &fixture.components(), &ComponentName::new(component))
    }

    fn fixture() -> ProjectFixture {
        ProjectFixture::new()
            .component("ArrayBase", "")
            .component("ArrayCards", "")
            .component("Select", "")
    }

    #[test]
    fn test_externalization_predicate() {
        let fixture = fixture();
        let rules = rules(&fixture, "ArrayCards");

        assert!(rules.is_external("vue"));
        assert!(rules.is_external("element-plus/es/components/select"));
        assert!(rules.is_external("@form-kit/arraybase"));
        assert!(!rules.is_external("@form-kit/arraycards"));
        assert!(!rules.is_external("@form-kit/_utils"));
        assert!(!rules.is_external("@form-kit/ArrayBase/index"));
        assert!(!rules.is_external("./Cards.vue"));
        // policy off
        assert!(!rules.is_external("echarts"));
    }

    #[test]
    fn test_policy_externalizes_third_party() {
        let fixture = fixture().configure(|c| c.build.externalize = vec!["ArrayCards".into()]);
        assert!(rules(&fixture, "ArrayCards").is_external("echarts"));
        assert!(!rules(&fixture, "Select").is_external("echarts"));
    }

    #[test]
    fn test_aggregate_bundles_components() {
        let fixture = fixture();
        let rules = rules(&fixture, "");

        assert!(rules.siblings.is_empty());
        assert!(!rules.is_external("@form-kit/arraybase"));
        assert!(rules.is_external("vue"));
    }

    #[test]
    fn test_globals() {
        let fixture = fixture();
        let ctx = fixture.context();
        let mut deps = ComponentDependencies::default();
        deps.internal.insert(ComponentName::new("ArrayBase"));
        deps.external.insert("echarts".into(), "^5.4.0".into());

        let globals = compute_globals(&ctx, &ComponentName::new("ArrayCards"), &deps);
        assert_eq!(globals["vue"], "Vue");
        assert_eq!(globals["element-plus"], "ElementPlus");
        assert_eq!(globals["echarts"], "Echarts");
        assert_eq!(globals["@form-kit/arraybase"], "FormKitArrayBase");
    }
}
