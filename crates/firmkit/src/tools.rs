// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Tool loading.
//!
//! Packaged tools live under `PACKAGER/tools/TOOL/VERSION/`. Bundled tools
//! ship with an IDE in a single directory described by a
//! `builtin_tools_versions.txt` file; when no such file exists, a bundle
//! root falls back to the packaged layout under the unnamed packager.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::Tool;
use crate::loader::{dir_name, sorted_subdirectories};
use crate::manager::PackageManagerBuilder;
use crate::properties::PropertyMap;
use crate::version::RelaxedVersion;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./tools_test.rs"]
mod tools_test;

impl PackageManagerBuilder {
    /// Load the tools under `tools_path` into the given package.
    pub fn load_tools_from_package_dir(
        &mut self,
        packager: &str,
        tools_path: &Path,
    ) -> Vec<Error> {
        debug!("Loading tools from dir: {}", tools_path.display());

        let tool_dirs = match sorted_subdirectories(tools_path) {
            Ok(dirs) => dirs,
            Err(err) => return vec![err],
        };

        let mut errors = Vec::new();
        for tool_path in tool_dirs {
            let name = dir_name(&tool_path);
            let tool = self
                .packages
                .get_or_create_package(packager)
                .get_or_create_tool(&name);
            if let Err(err) = load_tool_releases(tool, &tool_path) {
                errors.push(err);
            }
        }
        errors
    }

    /// Load bundled tools from a set of bundle roots, in order.
    pub fn load_tools_from_bundle_directories(&mut self, paths: &[PathBuf]) -> Vec<Error> {
        let mut errors = Vec::new();
        for path in paths {
            if let Err(err) = self.load_tools_from_bundle_directory(path) {
                errors.push(err);
            }
        }
        errors
    }

    /// Load bundled tools from a single bundle root.
    ///
    /// The root is searched recursively for the first
    /// `builtin_tools_versions.txt`; the walk stops descending at the first
    /// hit. All tools listed there share its parent directory as their
    /// install dir. Without the file, the root is parsed as a packaged tools
    /// directory under the unnamed packager.
    pub fn load_tools_from_bundle_directory(&mut self, tools_path: &Path) -> Result<()> {
        info!("Loading tools from bundle dir: {}", tools_path.display());

        let Some(versions_txt) = find_builtin_tools_versions(tools_path) else {
            // Per-tool problems are not fatal for a bundle root
            for err in self.load_tools_from_package_dir("", tools_path) {
                debug!("Skipping bundled tool: {err}");
            }
            return Ok(());
        };

        debug!("Found {}", versions_txt.display());
        let install_dir = versions_txt
            .parent()
            .map(|p| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()))
            .ok_or_else(|| Error::NotADirectory(versions_txt.clone()))?;

        let all = PropertyMap::load(&versions_txt)?;
        for (packager, tools_data) in all.first_level_of() {
            for (tool_name, tool_version) in tools_data.iter() {
                let release = self
                    .packages
                    .get_or_create_package(&packager)
                    .get_or_create_tool(tool_name)
                    .get_or_create_release(&RelaxedVersion::parse(tool_version));
                release.install_dir = Some(install_dir.clone());
                info!("Loaded bundled tool {packager}:{tool_name}@{tool_version}");
            }
        }
        Ok(())
    }
}

/// Load every version directory of a packaged tool.
fn load_tool_releases(tool: &mut Tool, tool_path: &Path) -> Result<()> {
    for version_path in sorted_subdirectories(tool_path)? {
        let version = RelaxedVersion::parse(&dir_name(&version_path));
        let install_dir = dunce::canonicalize(&version_path).map_err(|error| Error::ReadFailed {
            path: version_path.clone(),
            error,
        })?;
        if !install_dir.is_dir() {
            return Err(Error::NotADirectory(install_dir));
        }
        tool.get_or_create_release(&version).install_dir = Some(install_dir);
        info!("Loaded tool {}@{}", tool.id(), version);
    }
    Ok(())
}

/// Find the first `builtin_tools_versions.txt` in a depth-first lexical
/// walk of `root`, pruning the walk at the first hit.
fn find_builtin_tools_versions(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_file() && path.file_name().is_some_and(|n| n == "builtin_tools_versions.txt") {
            return Some(path);
        }
        if path.is_dir() {
            if let Some(found) = find_builtin_tools_versions(&path) {
                return Some(found);
            }
        }
    }
    None
}
