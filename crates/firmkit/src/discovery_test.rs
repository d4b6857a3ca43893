// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::{Path, PathBuf};

use super::*;
use crate::manager::{Config, PackageManagerBuilder};
use crate::properties::PropertyMap;
use crate::version::RelaxedVersion;

fn props(text: &str) -> PropertyMap {
    PropertyMap::parse(text, Path::new("test.txt")).unwrap()
}

fn builder_with_builtin_tools() -> PackageManagerBuilder {
    let mut builder = PackageManagerBuilder::new(Config::default());
    let package = builder.packages.get_or_create_package("builtin");
    for name in ["serial-discovery", "mdns-discovery"] {
        package
            .get_or_create_tool(name)
            .get_or_create_release(&RelaxedVersion::parse("1.4.0"))
            .install_dir = Some(PathBuf::from(format!("/tools/{name}/1.4.0")));
    }
    builder
}

#[rstest]
fn test_resolve_builtin_discovery_tool() {
    let pm = builder_with_builtin_tools().build();
    let cmd = pm.resolve_discovery_tool("builtin:serial-discovery").unwrap();
    assert_eq!(cmd.id, "builtin:serial-discovery");
    assert_eq!(
        cmd.argv,
        vec!["/tools/serial-discovery/1.4.0/serial-discovery".to_string()]
    );
}

#[rstest]
fn test_resolve_discovery_tool_not_installed() {
    let mut builder = PackageManagerBuilder::new(Config::default());
    builder
        .packages
        .get_or_create_package("builtin")
        .get_or_create_tool("serial-discovery");
    let pm = builder.build();

    match pm.resolve_discovery_tool("builtin:serial-discovery") {
        Err(crate::Error::ToolNotInstalled(_)) => {}
        other => panic!("expected ToolNotInstalled, got: {other:?}"),
    }
}

#[rstest]
fn test_discoveries_from_release_required_list() {
    let mut builder = builder_with_builtin_tools();
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.properties = props(
        "pluggable_discovery.required.0=builtin:serial-discovery\npluggable_discovery.required.1=builtin:mdns-discovery\n",
    );
    let snapshot = release.clone();

    let pm = builder.build();
    let (commands, errors) = pm.discoveries_from_release(&snapshot);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let ids: Vec<_> = commands.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["builtin:serial-discovery", "builtin:mdns-discovery"]);
}

#[rstest]
fn test_discoveries_from_release_direct_pattern() {
    let mut builder = builder_with_builtin_tools();
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.install_dir = Some(PathBuf::from("/hw/acme/avr"));
    release.properties = props(
        "pluggable_discovery.teensy.pattern=\"{runtime.platform.path}/teensy_ports\" -J2\n",
    );
    let snapshot = release.clone();

    let pm = builder.build();
    let (commands, errors) = pm.discoveries_from_release(&snapshot);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].id, "teensy");
    assert_eq!(
        commands[0].argv,
        vec!["/hw/acme/avr/teensy_ports".to_string(), "-J2".to_string()]
    );
}

#[rstest]
fn test_discoveries_missing_pattern_is_error() {
    let mut builder = builder_with_builtin_tools();
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.properties = props("pluggable_discovery.teensy.timeout=5\n");
    let snapshot = release.clone();

    let pm = builder.build();
    let (commands, errors) = pm.discoveries_from_release(&snapshot);
    assert!(commands.is_empty());
    match errors.as_slice() {
        [crate::Error::MissingPattern(id)] => assert_eq!(id, "teensy"),
        other => panic!("expected MissingPattern, got: {other:?}"),
    }
}

#[rstest]
fn test_discoveries_malformed_quoting_is_error() {
    let mut builder = builder_with_builtin_tools();
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.properties = props("pluggable_discovery.bad.pattern=\"unterminated\n");
    let snapshot = release.clone();

    let pm = builder.build();
    let (_, errors) = pm.discoveries_from_release(&snapshot);
    match errors.as_slice() {
        [crate::Error::Quote(_)] => {}
        other => panic!("expected Quote error, got: {other:?}"),
    }
}

#[rstest]
fn test_load_discoveries_includes_builtins_once() {
    let mut builder = builder_with_builtin_tools();
    let release = builder
        .packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));
    release.install_dir = Some(PathBuf::from("/hw/acme/avr"));
    release.properties = props(
        "pluggable_discovery.required.0=builtin:serial-discovery\npluggable_discovery.required.1=builtin:mdns-discovery\n",
    );

    let pm = builder.build();
    let (commands, errors) = pm.load_discoveries();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let serial_count = commands
        .iter()
        .filter(|c| c.id == "builtin:serial-discovery")
        .count();
    assert_eq!(serial_count, 1, "duplicates are collapsed");
}
