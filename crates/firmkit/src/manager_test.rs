// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::{Path, PathBuf};

use super::*;
use crate::properties::PropertyMap;
use crate::version::RelaxedVersion;

fn props(text: &str) -> PropertyMap {
    PropertyMap::parse(text, Path::new("test.txt")).unwrap()
}

fn manager_with_board() -> PackageManager {
    let mut builder = PackageManagerBuilder::new(Config::default());
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 2, 3));
    release.install_dir = Some(PathBuf::from("/hw/acme/avr"));
    release.properties = props("compiler.path=/usr/bin\nname=Acme AVR\n");
    release.menus = props("cpu=Processor\n");

    let board = release.get_or_create_board("uno");
    board.properties = props(
        "name=Uno\nbuild.mcu=atmega8\nmenu.cpu.328p.build.mcu=atmega328p\nmenu.cpu.168.build.mcu=atmega168\n_id=uno\n",
    );
    builder.build()
}

#[rstest]
fn test_resolve_fqbn_plain_board() {
    let pm = manager_with_board();
    let fqbn = "acme:avr:uno".parse().unwrap();
    let resolved = pm.resolve_fqbn(&fqbn).unwrap();

    assert_eq!(resolved.board.board_id, "uno");
    assert_eq!(resolved.build_properties.get("build.mcu"), Some("atmega8"));
    assert_eq!(resolved.build_properties.get("build.arch"), Some("AVR"));
    assert_eq!(
        resolved.build_properties.get("build.fqbn"),
        Some("acme:avr:uno")
    );
    assert_eq!(
        resolved.build_properties.get("runtime.platform.path"),
        Some("/hw/acme/avr")
    );
}

#[rstest]
fn test_resolve_fqbn_menu_overlay() {
    let pm = manager_with_board();
    let fqbn = "acme:avr:uno:cpu=328p".parse().unwrap();
    let resolved = pm.resolve_fqbn(&fqbn).unwrap();
    assert_eq!(
        resolved.build_properties.get("build.mcu"),
        Some("atmega328p")
    );
}

#[rstest]
fn test_resolve_fqbn_rejects_unknown_option_and_value() {
    let pm = manager_with_board();

    let unknown_option = "acme:avr:uno:speed=16".parse().unwrap();
    match pm.resolve_fqbn(&unknown_option) {
        Err(crate::Error::InvalidFqbn { .. }) => {}
        other => panic!("expected InvalidFqbn, got: {other:?}"),
    }

    let unknown_value = "acme:avr:uno:cpu=999".parse().unwrap();
    assert!(pm.resolve_fqbn(&unknown_value).is_err());
}

#[rstest]
fn test_resolve_fqbn_unknown_board() {
    let pm = manager_with_board();
    let fqbn = "acme:avr:missing".parse().unwrap();
    match pm.resolve_fqbn(&fqbn) {
        Err(crate::Error::NotFound { kind: "board", .. }) => {}
        other => panic!("expected board NotFound, got: {other:?}"),
    }
}

#[rstest]
fn test_custom_global_properties_override_at_use_time() {
    let mut builder = PackageManagerBuilder::new(Config::default());
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.install_dir = Some(PathBuf::from("/hw/acme/avr"));
    release.properties = props("compiler.path=/platform/bin\n");
    release.get_or_create_board("uno").properties = props("name=Uno\n_id=uno\n");
    builder
        .custom_global_properties
        .merge(&props("compiler.path=/global/bin\n"));

    let pm = builder.build();
    let resolved = pm.resolve_fqbn(&"acme:avr:uno".parse().unwrap()).unwrap();
    assert_eq!(
        resolved.build_properties.get("compiler.path"),
        Some("/global/bin")
    );
}

#[rstest]
fn test_get_tool_reference_parsing() {
    let mut builder = PackageManagerBuilder::new(Config::default());
    builder
        .packages
        .get_or_create_package("builtin")
        .get_or_create_tool("serial-discovery");
    let pm = builder.build();

    assert!(pm.get_tool("builtin:serial-discovery").is_ok());
    match pm.get_tool("no-colon") {
        Err(crate::Error::MalformedReference(_)) => {}
        other => panic!("expected MalformedReference, got: {other:?}"),
    }
    match pm.get_tool("builtin:missing") {
        Err(crate::Error::UnknownTool(_)) => {}
        other => panic!("expected UnknownTool, got: {other:?}"),
    }
}

#[rstest]
fn test_tools_required_resolves_exact_then_latest() {
    let mut builder = PackageManagerBuilder::new(Config::default());
    {
        let tool = builder
            .packages
            .get_or_create_package("acme")
            .get_or_create_tool("avr-gcc");
        tool.get_or_create_release(&RelaxedVersion::parse("7.3.0")).install_dir =
            Some(PathBuf::from("/tools/avr-gcc/7.3.0"));
    }
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.tool_dependencies = vec![crate::catalog::ToolDependency {
        packager: "acme".to_string(),
        name: "avr-gcc".to_string(),
        version: RelaxedVersion::parse("7.3.0"),
    }];
    let snapshot = release.clone();

    let pm = builder.build();
    let tools = pm.tools_required_from_platform_release(&snapshot).unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].version, RelaxedVersion::parse("7.3.0"));
}

#[rstest]
fn test_tools_required_missing_tool_errors() {
    let mut builder = PackageManagerBuilder::new(Config::default());
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.tool_dependencies = vec![crate::catalog::ToolDependency {
        packager: "acme".to_string(),
        name: "ghost".to_string(),
        version: RelaxedVersion::parse("1.0.0"),
    }];
    let snapshot = release.clone();

    let pm = builder.build();
    match pm.tools_required_from_platform_release(&snapshot) {
        Err(crate::Error::UnknownTool(_)) => {}
        other => panic!("expected UnknownTool, got: {other:?}"),
    }
}
