// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Conversions from legacy board package declarations to the pluggable
//! discovery scheme.
//!
//! Platforms that predate pluggable discovery declare serial ports via
//! `vid`/`pid` pairs, upload tools via `<action>.tool`, and network uploads
//! via `tools.<name>.upload.network_pattern`. These rewrites let such
//! packages keep working unmodified. They run only when the platform has no
//! `pluggable_discovery.*` property of its own.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::PlatformRelease;
use crate::properties::PropertyMap;

#[cfg(test)]
#[path = "./legacy_test.rs"]
mod legacy_test;

/// Convert the old `vid`/`pid` and `vid.N`/`pid.N` identification properties
/// into `upload_port.K.vid`/`upload_port.K.pid` entries.
///
/// Indices in the legacy form need not be contiguous; only pairs where both
/// members exist are converted. Fresh indices are assigned from 0 in the
/// order pairs are found.
pub fn convert_vid_pid_identification_properties(props: &mut PropertyMap) {
    let mut pairs: Vec<(String, String)> = Vec::new();

    if let (Some(vid), Some(pid)) = (props.get("vid"), props.get("pid")) {
        pairs.push((vid.to_string(), pid.to_string()));
    }

    for key in props.keys() {
        let Some(idx) = key.strip_prefix("vid.") else {
            continue;
        };
        if idx.parse::<u64>().is_err() {
            continue;
        }
        let (vid, pid) = (props.get(key), props.get(&format!("pid.{idx}")));
        if let (Some(vid), Some(pid)) = (vid, pid) {
            pairs.push((vid.to_string(), pid.to_string()));
        }
    }

    for (n, (vid, pid)) in pairs.into_iter().enumerate() {
        props.set(format!("upload_port.{n}.vid"), vid);
        props.set(format!("upload_port.{n}.pid"), pid);
    }
}

/// Synthesize `<action>.tool.default` for `upload`, `bootloader` and
/// `program` from the legacy `<action>.tool` declarations.
///
/// Some platforms set `<action>.tool` on submenu entries instead of the top
/// level, so `menu.<id>.<item>.<action>.tool` keys get a sibling `.default`
/// too. A missing `<action>.tool` is tolerated.
pub fn convert_upload_tools_to_pluggable_discovery(props: &mut PropertyMap) {
    let mut to_add = PropertyMap::new();
    for action in ["upload", "bootloader", "program"] {
        let action_tool = format!("{action}.tool");
        let default_key = format!("{action_tool}.default");
        if props.contains_key(&default_key) {
            continue;
        }

        for (key, value) in props.iter() {
            if !key.starts_with("menu.") {
                continue;
            }
            let split: Vec<&str> = key.split('.').collect();
            if split.len() != 5 || format!("{}.{}", split[3], split[4]) != action_tool {
                continue;
            }
            let prefix = format!("{}.{}.{}", split[0], split[1], split[2]);
            to_add.set(format!("{prefix}.{default_key}"), value);
        }

        if let Some(tool) = props.get(&action_tool) {
            to_add.set(default_key, tool);
        }
    }
    props.merge(&to_add);
}

/// Convert every `tools.<name>` entry carrying an `upload.network_pattern`
/// into a synthetic `<name>__pluggable_network` tool, and wire boards that
/// upload with the old tool to the new one.
pub fn convert_legacy_platform_to_pluggable_discovery(release: &mut PlatformRelease) {
    for (tool_name, tool_props) in release.properties.sub_tree("tools").first_level_of() {
        if !tool_props.contains_key("upload.network_pattern") {
            continue;
        }

        let converted_name = format!("{tool_name}__pluggable_network");
        let Some(converted) = convert_legacy_network_pattern(&tool_props, &converted_name) else {
            continue;
        };
        release.properties.merge(&converted);

        // Boards using the old tool gain a network upload and a board
        // identification entry at the first free upload_port index.
        for board in release.boards.values_mut() {
            if board.properties.get("upload.tool") != Some(tool_name.as_str())
                || board.properties.contains_key("upload.tool.network")
            {
                continue;
            }
            board
                .properties
                .set("upload.tool.network", converted_name.clone());
            let mut i = 0;
            while board.properties.contains_key(&format!("upload_port.{i}.vid")) {
                i += 1;
            }
            board
                .properties
                .set(format!("upload_port.{i}.board"), board.board_id.clone());
        }
    }
}

static NET_PROP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{upload\.network\.([^}]+)\}").expect("static regex"));

/// Rewrite a legacy network upload pattern into a pluggable discovery tool
/// definition, returning the new properties prefixed `tools.<new_name>.`.
fn convert_legacy_network_pattern(props: &PropertyMap, new_name: &str) -> Option<PropertyMap> {
    let mut props = props.clone();
    let mut pattern = props.remove("upload.network_pattern")?;

    pattern = pattern.replace("{serial.port}", "{upload.port.address}");
    pattern = pattern.replace("{network.port}", "{upload.port.properties.port}");
    if pattern.contains("{network.password}") {
        props.set("upload.field.password", "Password");
        props.set("upload.field.password.secret", "true");
        pattern = pattern.replace("{network.password}", "{upload.field.password}");
    }
    pattern = NET_PROP
        .replace_all(&pattern, "{upload.port.properties.$1}")
        .into_owned();
    props.set("upload.pattern", pattern);

    let mut prefixed = PropertyMap::new();
    for (key, value) in props.iter() {
        prefixed.set(format!("tools.{new_name}.{key}"), value);
    }
    Some(prefixed)
}
