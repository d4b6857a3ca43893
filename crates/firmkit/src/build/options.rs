// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The `build.options.json` summary of build inputs.
//!
//! The summary is stored in the build directory after every build. When a
//! new build's summary differs from the stored one, the whole build
//! directory is wiped so no stale object survives an input change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./options_test.rs"]
mod options_test;

pub const BUILD_OPTIONS_FILENAME: &str = "build.options.json";

/// The inputs that, when changed, invalidate everything in the build
/// directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    #[serde(rename = "hardwareFolders")]
    pub hardware_folders: String,
    #[serde(rename = "builtinToolsFolders")]
    pub builtin_tools_folders: String,
    #[serde(rename = "sketchLocation")]
    pub sketch_location: String,
    pub fqbn: String,
    #[serde(rename = "customBuildProperties")]
    pub custom_build_properties: String,
    #[serde(rename = "compiler.optimization_flags")]
    pub compiler_optimization_flags: String,
}

impl BuildOptions {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("build options always serialize")
    }
}

/// Join a path list the way it is recorded in the summary.
pub fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Read the previous build's summary, if one exists.
pub fn read_previous_build_options(build_path: &Path) -> Result<Option<String>> {
    let path = build_path.join(BUILD_OPTIONS_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|error| Error::ReadFailed { path, error })
}

/// Store the current build's summary.
pub fn store_build_options(build_path: &Path, json: &str) -> Result<()> {
    let path = build_path.join(BUILD_OPTIONS_FILENAME);
    std::fs::write(&path, json).map_err(|error| Error::ReadFailed { path, error })
}

/// Wipe the build directory's contents if the options changed.
///
/// Nothing is deleted when no previous summary exists or when the summaries
/// are equal. Returns whether a wipe happened. `clean` forces the wipe
/// regardless of the comparison.
pub fn wipe_build_path_if_build_options_changed(
    clean: bool,
    build_path: &Path,
    build_options_json: &str,
    build_options_json_previous: Option<&str>,
    on_wipe: impl FnOnce(),
) -> Result<bool> {
    let changed = match build_options_json_previous {
        Some(previous) => previous != build_options_json,
        None => false,
    };
    if !clean && !changed {
        return Ok(false);
    }

    on_wipe();
    for entry in std::fs::read_dir(build_path).map_err(|error| Error::ReadFailed {
        path: build_path.to_path_buf(),
        error,
    })? {
        let entry = entry.map_err(|error| Error::ReadFailed {
            path: build_path.to_path_buf(),
            error,
        })?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(true)
}
