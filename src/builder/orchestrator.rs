//! Building one package: two engine runs, README, manifest, optional publish.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use semver::Version;

use crate::analyzer::{ComponentDependencies, DependencyAnalyzer};
use crate::builder::engine::{BuildEngine, EngineJob, ModuleFormat};
use crate::builder::externals::{compute_globals, ExternalRules};
use crate::builder::staging::{stage_sources, StagedSources};
use crate::core::component::ComponentName;
use crate::core::context::BuildContext;
use crate::core::manifest::{PackageManifest, MANIFEST_FILE, STYLE_ENTRY, TYPES_ENTRY};
use crate::core::project::ProjectPackage;
use crate::core::versions::{bump_version, default_version, BumpKind, VersionRegistry};
use crate::rewrite::ImportRewriter;
use crate::util::fs::recreate_dir;
use crate::util::process::{CommandRunner, IoMode, ProcessBuilder};

/// Result of a successful package build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub component: ComponentName,
    pub package_name: String,
    pub package_dir: PathBuf,
    /// Version written to the manifest
    pub version: Version,
    pub published: bool,
    pub dependencies: ComponentDependencies,
}

/// Builds packages for the components of one run.
pub struct BuildOrchestrator<'a> {
    ctx: &'a BuildContext,
    project: &'a ProjectPackage,
    components: &'a BTreeSet<ComponentName>,
    registry: &'a VersionRegistry,
    engine: &'a dyn BuildEngine,
    runner: &'a dyn CommandRunner,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        ctx: &'a BuildContext,
        project: &'a ProjectPackage,
        components: &'a BTreeSet<ComponentName>,
        registry: &'a VersionRegistry,
        engine: &'a dyn BuildEngine,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        BuildOrchestrator {
            ctx,
            project,
            components,
            registry,
            engine,
            runner,
        }
    }

    /// Build `component` (the aggregate when empty), optionally publishing.
    ///
    /// The manifest is only written once both formats built, so a failed
    /// build never leaves a fresh manifest next to stale output. The
    /// registry is updated only after a successful publish.
    pub fn build(&self, component: &ComponentName, publish: bool) -> Result<BuildOutcome> {
        let current = self
            .registry
            .version_of(component.registry_key(), &default_version())?;

        let entry = self.ctx.entry_file(component).ok_or_else(|| {
            anyhow!(
                "no entry file found for {} in {}",
                component,
                self.ctx.component_dir(component).display()
            )
        })?;

        let deps = DependencyAnalyzer::new(self.ctx, self.project, self.components).analyze(component);

        let package_dir = self.ctx.package_dir(component);
        for format in ModuleFormat::ALL {
            recreate_dir(&package_dir.join(format.dir()))?;
        }

        // the aggregate may rewrite imports into any component
        let rewrite_set = if component.is_aggregate() {
            self.components.clone()
        } else {
            deps.internal.clone()
        };
        let rewriter = ImportRewriter::new(self.ctx, self.components, component, &rewrite_set);
        let staged = stage_sources(self.ctx.source_root(), self.ctx.output_root(), &rewriter)?;

        for format in ModuleFormat::ALL {
            let job = self.job(component, &deps, &staged, &entry, &package_dir, format);
            tracing::info!("building {} ({})", job.package_name, format);
            self.engine
                .build(&job)
                .with_context(|| format!("failed to build {} ({})", component, format))?;
        }
        drop(staged);

        self.copy_readme(component, &package_dir)?;

        let version = bump_version(&current, BumpKind::Patch);
        let manifest = self.manifest(component, &deps, &package_dir, &version)?;
        manifest.write(&package_dir.join(MANIFEST_FILE))?;
        tracing::info!("wrote {} {}", manifest.name, manifest.version);

        if publish {
            self.publish(component, &package_dir, &version)?;
        }

        Ok(BuildOutcome {
            component: component.clone(),
            package_name: manifest.name,
            package_dir,
            version,
            published: publish,
            dependencies: deps,
        })
    }

    fn job(
        &self,
        component: &ComponentName,
        deps: &ComponentDependencies,
        staged: &StagedSources,
        entry: &Path,
        package_dir: &Path,
        format: ModuleFormat,
    ) -> EngineJob {
        let flags = self.ctx.flags();
        EngineJob {
            component: component.to_string(),
            package_name: component.package_name(self.ctx.namespace()),
            root: staged.root(),
            entry: staged.map_path(entry),
            out_dir: package_dir.join(format.dir()),
            format,
            file_name: "index".to_string(),
            extension: format.extension().to_string(),
            named_exports: format == ModuleFormat::Cjs,
            aliases: staged.map_aliases(self.ctx.aliases()),
            external: ExternalRules::for_component(self.ctx, self.components, component),
            globals: compute_globals(self.ctx, component, deps),
            chunking: flags.chunking,
            preserve_modules: flags.preserve_modules,
            minify: flags.minify,
            css_preprocess: true,
            declarations: !flags.exclude_heavy_plugins,
            compress: !flags.exclude_heavy_plugins,
            work_dir: staged.dir().to_path_buf(),
        }
    }

    fn copy_readme(&self, component: &ComponentName, package_dir: &Path) -> Result<()> {
        let readme = self.ctx.component_dir(component).join("README.md");
        if readme.is_file() {
            let dest = package_dir.join("README.md");
            std::fs::copy(&readme, &dest)
                .with_context(|| format!("failed to copy {}", readme.display()))?;
        }
        Ok(())
    }

    fn manifest(
        &self,
        component: &ComponentName,
        deps: &ComponentDependencies,
        package_dir: &Path,
        version: &Version,
    ) -> Result<PackageManifest> {
        let ns = self.ctx.namespace();
        let mut manifest = PackageManifest::new(component.package_name(ns), version.to_string());

        // the aggregate bundles its components
        if !component.is_aggregate() {
            for dep in &deps.internal {
                let dep_version = self
                    .registry
                    .version_of(dep.registry_key(), &default_version())?;
                manifest
                    .dependencies
                    .insert(dep.package_name(ns), format!("^{}", dep_version));
            }
        }
        manifest.dependencies.extend(deps.external.clone());
        manifest.peer_dependencies = deps.peer_dependencies.clone();

        if package_dir.join(TYPES_ENTRY).is_file() {
            manifest = manifest.with_types();
        }
        if package_dir.join(STYLE_ENTRY).is_file() {
            manifest = manifest.with_style();
        }
        Ok(manifest)
    }

    /// Publish from the package directory; record the version on success.
    fn publish(&self, component: &ComponentName, package_dir: &Path, version: &Version) -> Result<()> {
        let settings = self.ctx.publish();
        let cmd = ProcessBuilder::new(&settings.program)
            .args(&settings.publish_args)
            .cwd(package_dir)
            .timeout(settings.timeout)
            .io(IoMode::Inherited);

        let output = self
            .runner
            .run(&cmd)
            .with_context(|| format!("failed to run `{}`", cmd.display_command()))?;
        if !output.success() {
            bail!(
                "publishing {} {} failed (`{}` exited with {:?})",
                component.package_name(self.ctx.namespace()),
                version,
                cmd.display_command(),
                output.code
            );
        }

        self.registry.set(component.registry_key(), version)?;
        tracing::info!("recorded {} {}", component.registry_key(), version);
        Ok(())
    }
}
