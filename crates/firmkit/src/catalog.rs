// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The in-memory catalog of packagers, platforms, boards and tools.
//!
//! The catalog exclusively owns everything below it: packagers own platforms
//! and tools, platforms own releases, releases own boards and programmers.
//! Parent links are plain string IDs so the ownership graph stays a tree.
//!
//! Entities are created on demand with the `get_or_create_*` family during
//! loading and frozen once the catalog is handed to the explorer phase.

use std::collections::BTreeMap;
use std::path::PathBuf;

use semver::Version;

use crate::properties::PropertyMap;
use crate::version::RelaxedVersion;

#[cfg(test)]
#[path = "./catalog_test.rs"]
mod catalog_test;

/// Root of the catalog: packager id → package.
#[derive(Debug, Clone, Default)]
pub struct Packages {
    packages: BTreeMap<String, Package>,
}

impl Packages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_package(&mut self, packager: &str) -> &mut Package {
        self.packages
            .entry(packager.to_string())
            .or_insert_with(|| Package::new(packager))
    }

    pub fn get_package(&self, packager: &str) -> Option<&Package> {
        self.packages.get(packager)
    }

    pub fn remove_package(&mut self, packager: &str) -> Option<Package> {
        self.packages.remove(packager)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Package)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All platform releases that are present on disk.
    pub fn installed_platform_releases(&self) -> impl Iterator<Item = &PlatformRelease> {
        self.packages.values().flat_map(|p| {
            p.platforms
                .values()
                .flat_map(|platform| platform.releases.values())
                .filter(|release| release.install_dir.is_some())
        })
    }
}

/// One packager (vendor) with its platforms and tools.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub platforms: BTreeMap<String, Platform>,
    pub tools: BTreeMap<String, Tool>,
}

impl Package {
    fn new(name: &str) -> Self {
        Package {
            name: name.to_string(),
            platforms: BTreeMap::new(),
            tools: BTreeMap::new(),
        }
    }

    pub fn get_or_create_platform(&mut self, architecture: &str) -> &mut Platform {
        let packager = self.name.clone();
        self.platforms
            .entry(architecture.to_string())
            .or_insert_with(|| Platform::new(&packager, architecture))
    }

    pub fn get_or_create_tool(&mut self, name: &str) -> &mut Tool {
        let packager = self.name.clone();
        self.tools
            .entry(name.to_string())
            .or_insert_with(|| Tool::new(&packager, name))
    }

    pub fn get_platform(&self, architecture: &str) -> Option<&Platform> {
        self.platforms.get(architecture)
    }

    pub fn get_tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }
}

/// A board support package for one architecture under one packager.
#[derive(Debug, Clone)]
pub struct Platform {
    pub packager: String,
    pub architecture: String,
    /// Human readable name, set from `platform.txt` or the package index.
    pub name: String,
    pub releases: BTreeMap<Version, PlatformRelease>,
}

impl Platform {
    fn new(packager: &str, architecture: &str) -> Self {
        Platform {
            packager: packager.to_string(),
            architecture: architecture.to_string(),
            name: String::new(),
            releases: BTreeMap::new(),
        }
    }

    pub fn get_or_create_release(&mut self, version: &Version) -> &mut PlatformRelease {
        let packager = self.packager.clone();
        let architecture = self.architecture.clone();
        self.releases
            .entry(version.clone())
            .or_insert_with(|| PlatformRelease::new(&packager, &architecture, version))
    }

    pub fn get_release(&self, version: &Version) -> Option<&PlatformRelease> {
        self.releases.get(version)
    }

    pub fn latest_release(&self) -> Option<&PlatformRelease> {
        self.releases.values().next_back()
    }

    /// Latest release that is actually present on disk.
    pub fn latest_installed_release(&self) -> Option<&PlatformRelease> {
        self.releases
            .values()
            .rev()
            .find(|r| r.install_dir.is_some())
    }

    /// The `packager:architecture` identifier.
    pub fn id(&self) -> String {
        format!("{}:{}", self.packager, self.architecture)
    }
}

/// A tool required by a platform release, as declared in a package index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDependency {
    pub packager: String,
    pub name: String,
    pub version: RelaxedVersion,
}

/// A pluggable monitor implementation reference (`packager:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDependency {
    pub packager: String,
    pub name: String,
}

/// One installed version of a platform.
#[derive(Debug, Clone)]
pub struct PlatformRelease {
    pub packager: String,
    pub architecture: String,
    pub version: Version,
    pub install_dir: Option<PathBuf>,
    pub properties: PropertyMap,
    pub boards: BTreeMap<String, Board>,
    pub programmers: BTreeMap<String, Programmer>,
    /// Menu id → label, from the `menu` group of `boards.txt`.
    pub menus: PropertyMap,
    /// Monitor protocol → implementation, from `pluggable_monitor.required.*`.
    pub monitors: BTreeMap<String, MonitorDependency>,
    /// Monitor protocol → command recipe, development override.
    pub monitors_dev_recipes: BTreeMap<String, String>,
    pub tool_dependencies: Vec<ToolDependency>,
    pub pluggable_discovery_aware: bool,
    pub is_ide_bundled: bool,
    pub manually_installed: bool,
}

impl PlatformRelease {
    fn new(packager: &str, architecture: &str, version: &Version) -> Self {
        PlatformRelease {
            packager: packager.to_string(),
            architecture: architecture.to_string(),
            version: version.clone(),
            install_dir: None,
            properties: PropertyMap::new(),
            boards: BTreeMap::new(),
            programmers: BTreeMap::new(),
            menus: PropertyMap::new(),
            monitors: BTreeMap::new(),
            monitors_dev_recipes: BTreeMap::new(),
            tool_dependencies: Vec::new(),
            pluggable_discovery_aware: false,
            is_ide_bundled: false,
            manually_installed: false,
        }
    }

    pub fn get_or_create_board(&mut self, board_id: &str) -> &mut Board {
        self.boards
            .entry(board_id.to_string())
            .or_insert_with(|| Board {
                board_id: board_id.to_string(),
                properties: PropertyMap::new(),
            })
    }

    pub fn get_board(&self, board_id: &str) -> Option<&Board> {
        self.boards.get(board_id)
    }

    /// The `packager:architecture@version` identifier.
    pub fn id(&self) -> String {
        format!("{}:{}@{}", self.packager, self.architecture, self.version)
    }

    /// Properties describing where this release lives on disk, merged into
    /// recipes at expansion time.
    pub fn runtime_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(dir) = &self.install_dir {
            props.set("runtime.platform.path", dir.display().to_string());
            if let Some(parent) = dir.parent() {
                props.set("runtime.hardware.path", parent.display().to_string());
            }
        }
        props
    }
}

/// A single board definition from `boards.txt`.
#[derive(Debug, Clone)]
pub struct Board {
    pub board_id: String,
    pub properties: PropertyMap,
}

impl Board {
    pub fn name(&self) -> &str {
        self.properties.get("name").unwrap_or(&self.board_id)
    }
}

/// A programmer definition from `programmers.txt`.
#[derive(Debug, Clone)]
pub struct Programmer {
    pub name: String,
    pub properties: PropertyMap,
    /// Id of the release this programmer belongs to.
    pub platform_release: String,
}

/// An external tool (compiler, uploader, discovery...) under a packager.
#[derive(Debug, Clone)]
pub struct Tool {
    pub packager: String,
    pub name: String,
    pub releases: BTreeMap<RelaxedVersion, ToolRelease>,
}

impl Tool {
    fn new(packager: &str, name: &str) -> Self {
        Tool {
            packager: packager.to_string(),
            name: name.to_string(),
            releases: BTreeMap::new(),
        }
    }

    pub fn get_or_create_release(&mut self, version: &RelaxedVersion) -> &mut ToolRelease {
        let tool = self.name.clone();
        self.releases
            .entry(version.clone())
            .or_insert_with(|| ToolRelease {
                tool,
                version: version.clone(),
                install_dir: None,
            })
    }

    /// The newest release with an install directory, if any.
    pub fn latest_installed(&self) -> Option<&ToolRelease> {
        self.releases
            .values()
            .rev()
            .find(|r| r.install_dir.is_some())
    }

    /// The `packager:name` identifier.
    pub fn id(&self) -> String {
        format!("{}:{}", self.packager, self.name)
    }
}

/// One installed version of a tool.
#[derive(Debug, Clone)]
pub struct ToolRelease {
    pub tool: String,
    pub version: RelaxedVersion,
    pub install_dir: Option<PathBuf>,
}

impl ToolRelease {
    /// `runtime.tools.*` paths recipes use to locate this tool.
    pub fn runtime_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(dir) = &self.install_dir {
            let dir = dir.display().to_string();
            props.set(format!("runtime.tools.{}.path", self.tool), dir.clone());
            props.set(
                format!("runtime.tools.{}-{}.path", self.tool, self.version),
                dir,
            );
        }
        props
    }
}
