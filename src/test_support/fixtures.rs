//! On-disk project fixtures.
//!
//! [`ProjectFixture`] lays out a small component library in a temporary
//! directory: a `Kitpack.toml`, a root `package.json` and a `src/` tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::component::ComponentName;
use crate::core::context::BuildContext;
use crate::core::discovery::discover_components;
use crate::core::project::ProjectPackage;
use crate::util::config::{Config, CONFIG_FILE};

/// Root `package.json` of every fixture.
pub const PACKAGE_JSON: &str = r#"{
  "name": "form-kit-workspace",
  "private": true,
  "dependencies": {
    "vue": "^3.3.0",
    "element-plus": "^2.4.0",
    "echarts": "^5.4.0",
    "lodash-es": "^4.17.21"
  },
  "devDependencies": {
    "typescript": "^5.2.0"
  }
}
"#;

/// Configuration used by fixtures: namespace `form-kit`, sources in `src/`,
/// packages in `dist/`, no cooldown.
pub fn default_config() -> Config {
    let mut config = Config::default();
    config.library.namespace = Some("form-kit".to_string());
    config.library.alias_prefix = Some("@form-kit".to_string());
    config.library.source_root = Some(PathBuf::from("src"));
    config.library.output_root = Some(PathBuf::from("dist"));
    config.build.cooldown_ms = 0;
    config.build.peer_packages = vec!["vue".to_string(), "element-plus".to_string()];
    config.build.runtime_packages = vec!["vue".to_string()];
    config
}

/// A component library in a temporary directory.
pub struct ProjectFixture {
    dir: TempDir,
    config: Config,
}

impl ProjectFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fixture = ProjectFixture {
            dir,
            config: default_config(),
        };
        std::fs::create_dir_all(fixture.path().join("src")).expect("failed to create src");
        std::fs::write(fixture.path().join("package.json"), PACKAGE_JSON)
            .expect("failed to write package.json");
        fixture.write_config();
        fixture
    }

    /// Add a component directory with an `index.ts` entry.
    pub fn component(self, name: &str, source: &str) -> Self {
        self.file(&format!("src/{}/index.ts", name), source)
    }

    /// Write a file relative to the project root.
    pub fn file(self, rel: &str, content: &str) -> Self {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
        self
    }

    /// Adjust the configuration and rewrite `Kitpack.toml`.
    pub fn configure(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self.write_config();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> BuildContext {
        BuildContext::from_config(&self.config, self.path()).expect("invalid fixture config")
    }

    pub fn components(&self) -> BTreeSet<ComponentName> {
        discover_components(&self.context()).expect("discovery failed")
    }

    pub fn project(&self) -> ProjectPackage {
        ProjectPackage::load(self.path()).expect("failed to load package.json")
    }

    /// Read a file relative to the project root.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel))
            .unwrap_or_else(|e| panic!("failed to read {}: {}", rel, e))
    }

    fn write_config(&self) {
        let toml = toml::to_string(&self.config).expect("failed to serialize config");
        std::fs::write(self.path().join(CONFIG_FILE), toml).expect("failed to write config");
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        ProjectFixture::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_layout() {
        let fixture = ProjectFixture::new().component("Select", "export {}\n");

        assert!(fixture.path().join("src/Select/index.ts").is_file());
        assert!(fixture.path().join("package.json").is_file());
        let written = Config::load(&fixture.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(written.library.namespace.as_deref(), Some("form-kit"));
        assert_eq!(fixture.context().namespace(), "form-kit");
    }

    #[test]
    fn test_configure_rewrites_config() {
        let fixture = ProjectFixture::new().configure(|c| c.build.minify = false);
        let written = Config::load(&fixture.path().join(CONFIG_FILE)).unwrap();
        assert!(!written.build.minify);
        assert!(!fixture.config().build.minify);
    }
}
