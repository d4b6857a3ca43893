// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The subset of the package index format the loader needs.
//!
//! Two files use it: `installed.json`, written next to an installed release
//! to preserve its metadata when the upstream index is gone, and
//! `package_index_bundled.json`, which marks platforms shipped inside an IDE
//! bundle and carries their authoritative versions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{Packages, ToolDependency};
use crate::version::{parse_strict, RelaxedVersion};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./index_test.rs"]
mod index_test;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageIndex {
    #[serde(default)]
    pub packages: Vec<IndexPackage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexPackage {
    pub name: String,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub platforms: Vec<IndexPlatformRelease>,
    #[serde(default)]
    pub tools: Vec<IndexToolRelease>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexPlatformRelease {
    pub name: String,
    pub architecture: String,
    pub version: String,
    #[serde(default, rename = "toolsDependencies")]
    pub tools_dependencies: Vec<IndexToolDependency>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexToolDependency {
    pub packager: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexToolRelease {
    pub name: String,
    pub version: String,
}

impl PackageIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        serde_json::from_str(&text).map_err(|error| Error::InvalidIndex {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Recreate catalog entities for every package, platform release and
    /// tool named by the index. Existing entities are reused, so merging is
    /// idempotent and never loses already-loaded data: a name already set
    /// on a platform is kept, the index only fills gaps.
    pub fn merge_into_packages(&self, packages: &mut Packages) -> Result<()> {
        for index_package in &self.packages {
            let package = packages.get_or_create_package(&index_package.name);

            for index_release in &index_package.platforms {
                let version = parse_strict(
                    &index_release.version,
                    &format!(
                        "index entry {}:{}",
                        index_package.name, index_release.architecture
                    ),
                )?;
                let platform = package.get_or_create_platform(&index_release.architecture);
                if platform.name.is_empty() {
                    platform.name = index_release.name.clone();
                }
                let release = platform.get_or_create_release(&version);
                if release.tool_dependencies.is_empty() {
                    release.tool_dependencies = index_release
                        .tools_dependencies
                        .iter()
                        .map(|dep| ToolDependency {
                            packager: dep.packager.clone(),
                            name: dep.name.clone(),
                            version: RelaxedVersion::parse(&dep.version),
                        })
                        .collect();
                }
            }

            for index_tool in &index_package.tools {
                package
                    .get_or_create_tool(&index_tool.name)
                    .get_or_create_release(&RelaxedVersion::parse(&index_tool.version));
            }
        }
        Ok(())
    }
}
