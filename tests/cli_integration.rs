//! CLI integration tests for kitpack.
//!
//! The build engine and registry CLI are replaced by `true`/`false`, so
//! these tests exercise discovery, manifests, versions and exit codes
//! without Node.js.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the kitpack binary command.
fn kitpack() -> Command {
    Command::cargo_bin("kitpack").unwrap()
}

/// Get the kitpack-release binary command.
fn kitpack_release() -> Command {
    Command::cargo_bin("kitpack-release").unwrap()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn config(publish_program: &str) -> String {
    format!(
        r#"[library]
namespace = "form-kit"
alias_prefix = "@form-kit"
source_root = "src"
output_root = "dist"

[build]
peer_packages = ["vue"]
cooldown_ms = 0

[engine]
program = "true"
args = []

[publish]
program = "{publish_program}"
"#
    )
}

/// A two-component library configured with the given publish program.
fn project(publish_program: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "Kitpack.toml", &config(publish_program));
    write(
        root,
        "package.json",
        r#"{"name": "workspace", "private": true, "dependencies": {"vue": "^3.3.0"}}"#,
    );
    write(root, "src/ArrayBase/index.ts", "export const base = 1\n");
    write(
        root,
        "src/ArrayCards/index.ts",
        "import { base } from '../ArrayBase'\nimport { h } from 'vue'\n",
    );
    write(root, "src/index.ts", "export * from './ArrayBase'\nexport * from './ArrayCards'\n");
    tmp
}

fn json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn built_package(root: &Path, dir: &str, name: &str, version: &str) {
    write(
        root,
        &format!("dist/{}/package.json", dir),
        &format!("{{\n  \"name\": \"{}\",\n  \"version\": \"{}\"\n}}\n", name, version),
    );
}

// ============================================================================
// kitpack
// ============================================================================

#[cfg(unix)]
#[test]
fn test_unknown_mode_lists_valid_modes() {
    let tmp = project("true");

    kitpack()
        .args(["build", "Nope"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mode `Nope`"))
        .stderr(predicate::str::contains("ArrayBase, ArrayCards"));

    assert!(!tmp.path().join("dist").exists());
}

#[cfg(unix)]
#[test]
fn test_build_writes_manifest_without_recording() {
    let tmp = project("false");

    kitpack()
        .args(["build", "ArrayCards"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let manifest = json(&tmp.path().join("dist/arraycards/package.json"));
    assert_eq!(manifest["name"], "@form-kit/arraycards");
    assert_eq!(manifest["version"], "0.0.2");
    assert_eq!(manifest["dependencies"]["@form-kit/arraybase"], "^0.0.1");
    assert_eq!(manifest["peerDependencies"]["vue"], "^3.3.0");

    let registry = json(&tmp.path().join("build/versions.json"));
    assert!(registry.get("ArrayCards").is_none());
}

#[cfg(unix)]
#[test]
fn test_build_publish_records_version() {
    let tmp = project("true");

    kitpack()
        .args(["build-publish", "ArrayBase", "true"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let registry = json(&tmp.path().join("build/versions.json"));
    assert_eq!(registry["ArrayBase"], "0.0.2");
}

#[cfg(unix)]
#[test]
fn test_failed_publish_exits_non_zero() {
    let tmp = project("false");

    kitpack()
        .args(["build-publish", "library"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 package(s) failed"));

    let registry = json(&tmp.path().join("build/versions.json"));
    assert!(registry.get("_library").is_none());
}

#[cfg(unix)]
#[test]
fn test_build_all_covers_library() {
    let tmp = project("true");

    kitpack()
        .args(["build", "all", "--quiet"])
        .current_dir(tmp.path())
        .assert()
        .success();

    for dir in ["arraybase", "arraycards", "form-kit"] {
        assert!(tmp.path().join("dist").join(dir).join("package.json").is_file());
    }
    assert_eq!(json(&tmp.path().join("dist/form-kit/package.json"))["name"], "form-kit");
}

#[test]
fn test_missing_config_is_fatal() {
    let tmp = TempDir::new().unwrap();

    kitpack()
        .args(["build"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `Kitpack.toml`"));
}

#[test]
fn test_missing_required_key_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "Kitpack.toml", "[library]\nnamespace = \"form-kit\"\n");

    kitpack()
        .args(["build"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required configuration `library.alias_prefix`"));
}

// ============================================================================
// kitpack-release
// ============================================================================

#[cfg(unix)]
#[test]
fn test_release_dry_run_restores_versions() {
    let tmp = project("true");
    built_package(tmp.path(), "arraybase", "@form-kit/arraybase", "0.4.1");

    kitpack_release()
        .args(["minor", "--dry-run"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(json(&tmp.path().join("dist/arraybase/package.json"))["version"], "0.4.1");
}

#[cfg(unix)]
#[test]
fn test_release_publishes_filtered_packages() {
    let tmp = project("true");
    built_package(tmp.path(), "arraybase", "@form-kit/arraybase", "0.4.1");
    built_package(tmp.path(), "arraycards", "@form-kit/arraycards", "1.0.0");
    write(tmp.path(), "build/versions.json", "{\n  \"ArrayBase\": \"0.4.1\"\n}\n");

    kitpack_release()
        .args(["minor", "--filter=base,nothing"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert_eq!(json(&tmp.path().join("dist/arraybase/package.json"))["version"], "0.5.0");
    assert_eq!(json(&tmp.path().join("dist/arraycards/package.json"))["version"], "1.0.0");
    assert_eq!(json(&tmp.path().join("build/versions.json"))["ArrayBase"], "0.5.0");
}

#[cfg(unix)]
#[test]
fn test_release_failure_rolls_back() {
    let tmp = project("false");
    built_package(tmp.path(), "arraybase", "@form-kit/arraybase", "0.4.1");

    kitpack_release()
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 package(s) failed to publish"));

    assert_eq!(json(&tmp.path().join("dist/arraybase/package.json"))["version"], "0.4.1");
}

#[test]
fn test_release_rejects_unknown_bump() {
    let tmp = project("true");

    kitpack_release()
        .args(["huge"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid bump type `huge`"));
}
