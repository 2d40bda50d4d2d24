//! Core data structures for kitpack.
//!
//! - Component identities and discovery
//! - The per-run build context
//! - The project's declared packages
//! - Version registry and package manifests

pub mod component;
pub mod context;
pub mod discovery;
pub mod manifest;
pub mod project;
pub mod versions;

pub use component::{ComponentName, AGGREGATE_KEY};
pub use context::{BuildContext, BuildFlags};
pub use discovery::discover_components;
pub use manifest::{ManifestFile, PackageManifest};
pub use project::ProjectPackage;
pub use versions::{BumpKind, VersionRegistry};
