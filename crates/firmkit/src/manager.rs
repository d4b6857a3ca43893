// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The package manager: a mutable builder phase that loads hardware from
//! disk, and a frozen explorer phase that answers queries.

use std::path::PathBuf;

use crate::catalog::{Board, Packages, PlatformRelease, Tool, ToolRelease};
use crate::fqbn::Fqbn;
use crate::properties::PropertyMap;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./manager_test.rs"]
mod manager_test;

/// Search paths for hardware and bundled tools, in priority order.
///
/// These come from the caller's configuration layer; the package manager
/// treats them as plain ordered directory lists.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub hardware_dirs: Vec<PathBuf>,
    pub builtin_tools_dirs: Vec<PathBuf>,
}

/// Discovery/loading phase of the package manager.
///
/// Holds the mutable catalog while directories are scanned. Once loading is
/// done, [`PackageManagerBuilder::build`] freezes it into a
/// [`PackageManager`] for concurrent readers.
#[derive(Debug, Default)]
pub struct PackageManagerBuilder {
    pub(crate) config: Config,
    pub(crate) packages: Packages,
    /// Global `platform.txt` overrides found at hardware roots. They win
    /// over per-platform values at use time, not at load time.
    pub(crate) custom_global_properties: PropertyMap,
}

impl PackageManagerBuilder {
    pub fn new(config: Config) -> Self {
        PackageManagerBuilder {
            config,
            packages: Packages::new(),
            custom_global_properties: PropertyMap::new(),
        }
    }

    /// Freeze the catalog. No entity is added or removed afterwards.
    pub fn build(self) -> PackageManager {
        PackageManager {
            config: self.config,
            packages: self.packages,
            custom_global_properties: self.custom_global_properties,
        }
    }
}

/// A board resolved from an FQBN, with its effective build properties.
#[derive(Debug)]
pub struct ResolvedBoard<'a> {
    pub release: &'a PlatformRelease,
    pub board: &'a Board,
    pub build_properties: PropertyMap,
}

/// Frozen, query-only phase of the package manager.
#[derive(Debug)]
pub struct PackageManager {
    config: Config,
    packages: Packages,
    custom_global_properties: PropertyMap,
}

impl PackageManager {
    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn custom_global_properties(&self) -> &PropertyMap {
        &self.custom_global_properties
    }

    /// Look up a tool by `packager:name` reference.
    pub fn get_tool(&self, reference: &str) -> Result<&Tool> {
        let Some((packager, name)) = reference.split_once(':') else {
            return Err(Error::MalformedReference(reference.to_string()));
        };
        self.packages
            .get_package(packager)
            .and_then(|p| p.get_tool(name))
            .ok_or_else(|| Error::UnknownTool(reference.to_string()))
    }

    /// Latest installed release of the platform an FQBN names.
    pub fn find_platform_release(&self, fqbn: &Fqbn) -> Result<&PlatformRelease> {
        self.packages
            .get_package(&fqbn.packager)
            .and_then(|p| p.get_platform(&fqbn.architecture))
            .and_then(|p| p.latest_installed_release())
            .ok_or_else(|| Error::NotFound {
                kind: "platform",
                name: format!("{}:{}", fqbn.packager, fqbn.architecture),
            })
    }

    /// Installed tool releases required by a platform release, per its
    /// package-index tool dependencies.
    pub fn tools_required_from_platform_release(
        &self,
        release: &PlatformRelease,
    ) -> Result<Vec<&ToolRelease>> {
        let mut tools = Vec::new();
        for dep in &release.tool_dependencies {
            let tool = self
                .packages
                .get_package(&dep.packager)
                .and_then(|p| p.get_tool(&dep.name))
                .ok_or_else(|| Error::UnknownTool(format!("{}:{}", dep.packager, dep.name)))?;
            let tool_release = tool
                .releases
                .get(&dep.version)
                .filter(|r| r.install_dir.is_some())
                .or_else(|| tool.latest_installed())
                .ok_or_else(|| Error::ToolNotInstalled(tool.id()))?;
            tools.push(tool_release);
        }
        Ok(tools)
    }

    /// Resolve an FQBN to its board and effective build properties.
    ///
    /// Property precedence, lowest first: platform release properties, board
    /// properties, menu option overlays from the FQBN, global `platform.txt`
    /// overrides, runtime paths of the release and its required tools.
    pub fn resolve_fqbn<'a>(&'a self, fqbn: &Fqbn) -> Result<ResolvedBoard<'a>> {
        let release = self.find_platform_release(fqbn)?;
        let board = release
            .get_board(&fqbn.board_id)
            .ok_or_else(|| Error::NotFound {
                kind: "board",
                name: fqbn.to_string(),
            })?;

        let mut props = release.properties.clone();
        props.merge(&board.properties);

        for (option, value) in &fqbn.options {
            if !release.menus.contains_key(option) {
                return Err(Error::InvalidFqbn {
                    fqbn: fqbn.to_string(),
                    reason: format!("unknown board option {option:?}"),
                });
            }
            let overlay = board.properties.sub_tree(&format!("menu.{option}.{value}"));
            if overlay.is_empty() {
                return Err(Error::InvalidFqbn {
                    fqbn: fqbn.to_string(),
                    reason: format!("invalid value {value:?} for board option {option:?}"),
                });
            }
            props.merge(&overlay);
        }

        props.merge(&self.custom_global_properties);
        props.merge(&release.runtime_properties());
        if let Ok(tools) = self.tools_required_from_platform_release(release) {
            for tool in tools {
                props.merge(&tool.runtime_properties());
            }
        }

        props.set("build.fqbn", fqbn.to_string());
        props.set("build.arch", fqbn.architecture.to_uppercase());

        Ok(ResolvedBoard {
            release,
            board,
            build_properties: props,
        })
    }
}
