// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::Path;

use super::*;
use crate::catalog::Packages;

fn props(text: &str) -> PropertyMap {
    PropertyMap::parse(text, Path::new("test.txt")).unwrap()
}

#[rstest]
fn test_vid_pid_plain_pair() {
    let mut p = props("vid=0x2341\npid=0x0043\n");
    convert_vid_pid_identification_properties(&mut p);
    assert_eq!(p.get("upload_port.0.vid"), Some("0x2341"));
    assert_eq!(p.get("upload_port.0.pid"), Some("0x0043"));
}

#[rstest]
fn test_vid_pid_non_contiguous_indices() {
    let mut p = props("vid.0=0x1111\npid.0=0x2222\nvid.4=0x3333\npid.4=0x4444\nvid.7=0x5555\n");
    convert_vid_pid_identification_properties(&mut p);

    // Fresh indices from 0; the unpaired vid.7 is skipped
    assert_eq!(p.get("upload_port.0.vid"), Some("0x1111"));
    assert_eq!(p.get("upload_port.1.vid"), Some("0x3333"));
    assert_eq!(p.get("upload_port.1.pid"), Some("0x4444"));
    assert!(!p.contains_key("upload_port.2.vid"));
}

#[rstest]
fn test_upload_tool_default_from_top_level() {
    let mut p = props("upload.tool=avrdude\nbootloader.tool=avrdude\n");
    convert_upload_tools_to_pluggable_discovery(&mut p);
    assert_eq!(p.get("upload.tool.default"), Some("avrdude"));
    assert_eq!(p.get("bootloader.tool.default"), Some("avrdude"));
    assert!(!p.contains_key("program.tool.default"));
}

#[rstest]
fn test_upload_tool_default_from_menu_entries() {
    let mut p = props("menu.cpu.328p.upload.tool=avrdude\n");
    convert_upload_tools_to_pluggable_discovery(&mut p);
    assert_eq!(
        p.get("menu.cpu.328p.upload.tool.default"),
        Some("avrdude")
    );
}

#[rstest]
fn test_upload_tool_default_not_overwritten() {
    let mut p = props("upload.tool=avrdude\nupload.tool.default=custom\n");
    convert_upload_tools_to_pluggable_discovery(&mut p);
    assert_eq!(p.get("upload.tool.default"), Some("custom"));
}

#[rstest]
fn test_network_pattern_conversion() {
    let mut packages = Packages::new();
    let release = packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 2, 3));

    release.properties = props(
        "tools.avrdude.upload.network_pattern={runtime.tools.avrdude.path}/avrdude -p{build.mcu} -P{network.port}@{serial.port} -Upassword:{network.password} -F{upload.network.ssl}\n",
    );
    release
        .get_or_create_board("uno")
        .properties
        .merge(&props("upload.tool=avrdude\n"));

    convert_legacy_platform_to_pluggable_discovery(release);

    let pattern = release
        .properties
        .get("tools.avrdude__pluggable_network.upload.pattern")
        .expect("converted pattern present");
    assert!(pattern.contains("-P{upload.port.properties.port}@{upload.port.address}"));
    assert!(pattern.contains("-Upassword:{upload.field.password}"));
    assert!(pattern.contains("-F{upload.port.properties.ssl}"));
    assert!(!pattern.contains("{network."));

    assert_eq!(
        release
            .properties
            .get("tools.avrdude__pluggable_network.upload.field.password"),
        Some("Password")
    );
    assert_eq!(
        release
            .properties
            .get("tools.avrdude__pluggable_network.upload.field.password.secret"),
        Some("true")
    );
    // The legacy key does not survive under the new tool
    assert!(!release
        .properties
        .contains_key("tools.avrdude__pluggable_network.upload.network_pattern"));

    let board = release.get_board("uno").unwrap();
    assert_eq!(
        board.properties.get("upload.tool.network"),
        Some("avrdude__pluggable_network")
    );
    assert_eq!(board.properties.get("upload_port.0.board"), Some("uno"));
}

#[rstest]
fn test_network_pattern_respects_existing_vid_pid_indices() {
    let mut packages = Packages::new();
    let release = packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));

    release.properties = props("tools.net.upload.network_pattern=run {network.port}\n");
    let board = release.get_or_create_board("wifi");
    board.properties.merge(&props(
        "upload.tool=net\nupload_port.0.vid=0x1\nupload_port.0.pid=0x2\n",
    ));

    convert_legacy_platform_to_pluggable_discovery(release);

    let board = release.get_board("wifi").unwrap();
    assert_eq!(board.properties.get("upload_port.1.board"), Some("wifi"));
}

#[rstest]
fn test_board_with_other_tool_untouched() {
    let mut packages = Packages::new();
    let release = packages
        .get_or_create_package("acme")
        .get_or_create_platform("avr")
        .get_or_create_release(&semver::Version::new(1, 0, 0));

    release.properties = props("tools.net.upload.network_pattern=run {network.port}\n");
    release
        .get_or_create_board("uno")
        .properties
        .merge(&props("upload.tool=avrdude\n"));

    convert_legacy_platform_to_pluggable_discovery(release);

    let board = release.get_board("uno").unwrap();
    assert!(!board.properties.contains_key("upload.tool.network"));
}
