// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::Path;
use tempfile::TempDir;

use super::*;
use crate::manager::Config;

fn builder() -> PackageManagerBuilder {
    PackageManagerBuilder::new(Config::default())
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[rstest]
fn test_packaged_tools_layout() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("avrdude/6.3.0")).unwrap();
    std::fs::create_dir_all(tmp.path().join("avrdude/7.0.0")).unwrap();
    std::fs::create_dir_all(tmp.path().join("bossac/1.7.0")).unwrap();
    // Hidden entries and stray files are skipped
    std::fs::create_dir_all(tmp.path().join("avrdude/.cache")).unwrap();
    write(&tmp.path().join("avrdude/README.md"), "not a version\n");

    let mut b = builder();
    let errors = b.load_tools_from_package_dir("acme", tmp.path());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let pm = b.build();
    let package = pm.packages().get_package("acme").unwrap();
    let avrdude = package.get_tool("avrdude").unwrap();
    assert_eq!(avrdude.releases.len(), 2);
    assert_eq!(
        avrdude.latest_installed().unwrap().version,
        crate::version::RelaxedVersion::parse("7.0.0")
    );
    assert!(package.get_tool("bossac").is_some());
}

#[rstest]
fn test_bundle_with_builtin_tools_versions() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp.path().join("nested/builtin_tools_versions.txt"),
        "builtin.ctags=5.8-arduino11\nbuiltin.serial-discovery=1.4.0\n",
    );

    let mut b = builder();
    let errors = b.load_tools_from_bundle_directories(&[tmp.path().to_path_buf()]);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let pm = b.build();
    let package = pm.packages().get_package("builtin").unwrap();
    let ctags = package.get_tool("ctags").unwrap();
    let release = ctags.latest_installed().unwrap();
    // All bundled tools share the file's parent directory
    assert_eq!(
        release.install_dir.as_deref(),
        Some(dunce::canonicalize(tmp.path().join("nested")).unwrap().as_path())
    );
    assert!(package.get_tool("serial-discovery").is_some());
}

#[rstest]
fn test_bundle_walk_uses_first_hit_and_stops() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp.path().join("a/builtin_tools_versions.txt"),
        "builtin.ctags=1.0.0\n",
    );
    write(
        &tmp.path().join("b/builtin_tools_versions.txt"),
        "builtin.ctags=2.0.0\n",
    );

    let mut b = builder();
    let errors = b.load_tools_from_bundle_directories(&[tmp.path().to_path_buf()]);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let pm = b.build();
    let ctags = pm
        .packages()
        .get_package("builtin")
        .and_then(|p| p.get_tool("ctags"))
        .unwrap();
    assert_eq!(ctags.releases.len(), 1, "only the first file is used");
    assert_eq!(
        ctags.latest_installed().unwrap().version,
        crate::version::RelaxedVersion::parse("1.0.0")
    );
}

#[rstest]
fn test_bundle_without_marker_falls_back_to_unnamed_packager() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("ctags/5.8")).unwrap();

    let mut b = builder();
    let errors = b.load_tools_from_bundle_directories(&[tmp.path().to_path_buf()]);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let pm = b.build();
    let unnamed = pm.packages().get_package("").expect("unnamed packager");
    assert!(unnamed.get_tool("ctags").is_some());
}
