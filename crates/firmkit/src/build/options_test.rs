// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
fn test_wipeout_build_path_if_build_options_changed() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("should_be_deleted.txt"), "").unwrap();

    let wiped = wipe_build_path_if_build_options_changed(
        false,
        tmp.path(),
        r#"{ "new": "new" }"#,
        Some(r#"{ "old": "old" }"#),
        || {},
    )
    .unwrap();

    assert!(wiped);
    assert!(tmp.path().exists());
    let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(entries.len(), 0);
    assert!(!tmp.path().join("should_be_deleted.txt").exists());
}

#[rstest]
fn test_no_wipeout_without_previous_build_options() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("should_not_be_deleted.txt"), "").unwrap();

    let wiped = wipe_build_path_if_build_options_changed(
        false,
        tmp.path(),
        r#"{ "new": "new" }"#,
        None,
        || {},
    )
    .unwrap();

    assert!(!wiped);
    assert!(tmp.path().join("should_not_be_deleted.txt").exists());
}

#[rstest]
fn test_no_wipeout_when_options_unchanged() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("keep.o"), "").unwrap();

    let json = r#"{ "same": "same" }"#;
    let wiped =
        wipe_build_path_if_build_options_changed(false, tmp.path(), json, Some(json), || {})
            .unwrap();

    assert!(!wiped);
    assert!(tmp.path().join("keep.o").exists());
}

#[rstest]
fn test_clean_forces_wipe() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("core")).unwrap();
    std::fs::write(tmp.path().join("core/core.a"), "").unwrap();

    let json = r#"{ "same": "same" }"#;
    let wiped =
        wipe_build_path_if_build_options_changed(true, tmp.path(), json, Some(json), || {})
            .unwrap();

    assert!(wiped);
    assert!(!tmp.path().join("core").exists());
}

#[rstest]
fn test_store_and_read_round_trip() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(read_previous_build_options(tmp.path()).unwrap(), None);

    let options = BuildOptions {
        hardware_folders: "/hw".to_string(),
        fqbn: "acme:avr:uno".to_string(),
        ..Default::default()
    };
    store_build_options(tmp.path(), &options.to_json()).unwrap();

    let read_back = read_previous_build_options(tmp.path()).unwrap().unwrap();
    assert_eq!(read_back, options.to_json());
}
