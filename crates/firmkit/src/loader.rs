// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Hardware directory loading.
//!
//! Walks the configured hardware roots and populates the catalog. Loading is
//! best-effort: errors are accumulated per directory and returned as a
//! batch, so one malformed platform never prevents loading its siblings.
//!
//! Two historical directory layouts are accepted for a packager:
//!
//! ```text
//! PACKAGER/ARCHITECTURE/boards.txt                       (flat)
//! PACKAGER/hardware/ARCHITECTURE/VERSION/boards.txt      (nested)
//! PACKAGER/tools/TOOL/VERSION/...                        (nested only)
//! ```
//!
//! and two layouts for an architecture: `boards.txt` directly inside it
//! (unversioned), or one subdirectory per release version.

use std::path::{Path, PathBuf};

use semver::Version;
use tracing::{debug, info, warn};

use crate::catalog::{MonitorDependency, Packages, PlatformRelease, Programmer};
use crate::index::PackageIndex;
use crate::legacy;
use crate::manager::PackageManagerBuilder;
use crate::properties::PropertyMap;
use crate::version::parse_strict;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./loader_test.rs"]
mod loader_test;

/// Default discovery and monitor dependencies injected into platforms that
/// predate pluggable discovery.
const DEFAULT_DISCOVERIES: [(&str, &str); 2] = [
    ("pluggable_discovery.required.0", "builtin:serial-discovery"),
    ("pluggable_discovery.required.1", "builtin:mdns-discovery"),
];
const DEFAULT_SERIAL_MONITOR: (&str, &str) =
    ("pluggable_monitor.required.serial", "builtin:serial-monitor");

impl PackageManagerBuilder {
    /// Load all platforms from the configured hardware roots and all bundled
    /// tools from the configured built-in tool roots.
    pub fn load_hardware(&mut self) -> Vec<Error> {
        let hardware_dirs = self.config.hardware_dirs.clone();
        let mut errors = self.load_hardware_from_directories(&hardware_dirs);

        let bundle_dirs = self.config.builtin_tools_dirs.clone();
        errors.extend(self.load_tools_from_bundle_directories(&bundle_dirs));
        errors
    }

    /// Load platforms from a set of hardware roots, in order.
    pub fn load_hardware_from_directories(&mut self, paths: &[PathBuf]) -> Vec<Error> {
        let mut errors = Vec::new();
        for path in paths {
            errors.extend(self.load_hardware_from_directory(path));
        }
        errors
    }

    /// Load platforms from a single hardware root.
    pub fn load_hardware_from_directory(&mut self, path: &Path) -> Vec<Error> {
        info!("Loading hardware from: {}", path.display());
        let mut errors = Vec::new();

        if !path.is_dir() {
            return vec![Error::NotADirectory(path.to_path_buf())];
        }
        let path = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        // "Global" platform.txt used to override all installed platforms at
        // use time.
        let global_platform_txt = path.join(crate::PLATFORM_FILENAME);
        if global_platform_txt.exists() {
            info!(
                "Loading custom platform properties: {}",
                global_platform_txt.display()
            );
            match PropertyMap::load(&global_platform_txt) {
                Ok(props) => self.custom_global_properties.merge(&props),
                Err(err) => warn!("Error loading custom platform properties: {err}"),
            }
        }

        let packager_dirs = match sorted_subdirectories(&path) {
            Ok(dirs) => dirs,
            Err(err) => return vec![err],
        };

        for packager_path in packager_dirs {
            let packager = dir_name(&packager_path);

            // Skip tools, they are not packagers and contain no platforms
            if packager == "tools" {
                debug!("Excluding directory: {}", packager_path.display());
                continue;
            }

            // Follow symlinks once so a linked packager loads in place
            let packager_path = match dunce::canonicalize(&packager_path) {
                Ok(resolved) => resolved,
                Err(error) => {
                    errors.push(Error::ReadFailed {
                        path: packager_path.clone(),
                        error,
                    });
                    continue;
                }
            };

            // A packager either holds architectures directly or nests them
            // under hardware/, with tools/ as a sibling.
            let hardware_subdir = packager_path.join("hardware");
            let architecture_parent = if hardware_subdir.is_dir() {
                hardware_subdir
            } else {
                packager_path.clone()
            };

            self.packages.get_or_create_package(&packager);
            errors.extend(self.load_platforms(&packager, &architecture_parent));

            let tools_subdir = packager_path.join("tools");
            if tools_subdir.is_dir() {
                debug!("Loading tools from: {}", tools_subdir.display());
                errors.extend(self.load_tools_from_package_dir(&packager, &tools_subdir));
            }

            // A package without platforms or tools holds nothing valuable
            let package = self.packages.get_package(&packager);
            if package.is_some_and(|p| p.platforms.is_empty() && p.tools.is_empty()) {
                self.packages.remove_package(&packager);
            }
        }

        errors
    }

    fn load_platforms(&mut self, packager: &str, architecture_parent: &Path) -> Vec<Error> {
        debug!(
            "Loading package {} from: {}",
            packager,
            architecture_parent.display()
        );

        let mut errors = Vec::new();
        let architecture_dirs = match sorted_subdirectories(architecture_parent) {
            Ok(dirs) => dirs,
            Err(err) => return vec![err],
        };

        for platform_path in architecture_dirs {
            let architecture = dir_name(&platform_path);
            if architecture == "tools" {
                continue;
            }
            if let Err(err) = self.load_platform(packager, &architecture, &platform_path) {
                errors.push(err.for_platform(format!("{packager}:{architecture}")));
            }
        }
        errors
    }

    /// Load a single platform and all its installed releases.
    ///
    /// A failed release is removed from the catalog again, so partial loads
    /// never leave a half-initialized release behind.
    fn load_platform(
        &mut self,
        packager: &str,
        architecture: &str,
        platform_path: &Path,
    ) -> Result<()> {
        if !platform_path.is_dir() {
            return Err(Error::NotADirectory(platform_path.to_path_buf()));
        }

        if platform_path.join(crate::BOARDS_FILENAME).exists() {
            // Unversioned layout: the version comes from platform.txt, or
            // from the IDE bundle index when one wraps this platform.
            let platform_txt = platform_path.join(crate::PLATFORM_FILENAME);
            let platform_properties = PropertyMap::safe_load(&platform_txt)?;
            let version_string = platform_properties
                .expand_props_in_string(platform_properties.get("version").unwrap_or(""));
            let mut version = parse_strict(&version_string, &platform_txt.display().to_string())?;

            let bundled_index_path = platform_path
                .parent()
                .and_then(Path::parent)
                .map(|p| p.join("package_index_bundled.json"));
            let is_ide_bundled = bundled_index_path.as_deref().is_some_and(Path::exists);
            if let (true, Some(index_path)) = (is_ide_bundled, &bundled_index_path) {
                // The bundle index is authoritative for the version. It is
                // merged into a scratch catalog only; installed.json fills
                // the real catalog later.
                let index = PackageIndex::load(index_path)?;
                let mut scratch = Packages::new();
                index.merge_into_packages(&mut scratch)?;
                match scratch
                    .get_package(packager)
                    .and_then(|p| p.get_platform(architecture))
                    .and_then(|p| p.latest_release())
                {
                    Some(bundled) => version = bundled.version.clone(),
                    None => warn!(
                        "Can't determine bundle platform version for {packager}:{architecture}"
                    ),
                }
                info!("Platform {packager}:{architecture} is built-in");
            }

            self.load_release_guarded(packager, architecture, &version, platform_path, |release| {
                release.is_ide_bundled = is_ide_bundled;
                release.manually_installed = !is_ide_bundled;
            })?;
        } else {
            // Versioned layout: one subdirectory per release. Directories
            // that are not named like a version or hold no boards.txt are
            // not releases and are silently ignored.
            for version_dir in sorted_subdirectories(platform_path)? {
                if !version_dir.join(crate::BOARDS_FILENAME).exists() {
                    continue;
                }
                let Ok(version) =
                    parse_strict(&dir_name(&version_dir), &version_dir.display().to_string())
                else {
                    continue;
                };
                self.load_release_guarded(packager, architecture, &version, &version_dir, |_| {})?;
            }
        }

        Ok(())
    }

    /// Create the release, load it, and roll it back from the catalog if
    /// loading fails.
    fn load_release_guarded(
        &mut self,
        packager: &str,
        architecture: &str,
        version: &Version,
        release_dir: &Path,
        init: impl FnOnce(&mut PlatformRelease),
    ) -> Result<()> {
        let release = self
            .packages
            .get_or_create_package(packager)
            .get_or_create_platform(architecture)
            .get_or_create_release(version);
        init(release);

        match self.load_platform_release(packager, architecture, version, release_dir) {
            Ok(()) => {
                info!("Loaded platform {packager}:{architecture}@{version}");
                Ok(())
            }
            Err(err) => {
                if let Some(platform) = self
                    .packages
                    .get_or_create_package(packager)
                    .platforms
                    .get_mut(architecture)
                {
                    platform.releases.remove(version);
                }
                Err(err)
            }
        }
    }

    fn load_platform_release(
        &mut self,
        packager: &str,
        architecture: &str,
        version: &Version,
        dir: &Path,
    ) -> Result<()> {
        // If installed.json is present, merge it first: it reconstitutes
        // metadata for platforms whose upstream index is no longer
        // reachable.
        let installed_json = dir.join("installed.json");
        if installed_json.exists() {
            PackageIndex::load(&installed_json)?.merge_into_packages(&mut self.packages)?;
        }

        let release = self
            .packages
            .get_or_create_package(packager)
            .get_or_create_platform(architecture)
            .get_or_create_release(version);
        release.install_dir = Some(dir.to_path_buf());

        let mut properties = release.properties.clone();
        properties.merge(&PropertyMap::safe_load(&dir.join(crate::PLATFORM_FILENAME))?);
        properties.merge(&PropertyMap::safe_load(&dir.join(crate::PLATFORM_LOCAL_FILENAME))?);

        // A platform either speaks pluggable discovery itself or gets the
        // builtin serial/mdns defaults injected.
        release.pluggable_discovery_aware = !properties.sub_tree("pluggable_discovery").is_empty();
        if !release.pluggable_discovery_aware {
            for (key, value) in DEFAULT_DISCOVERIES {
                properties.set(key, value);
            }
            properties.set(DEFAULT_SERIAL_MONITOR.0, DEFAULT_SERIAL_MONITOR.1);
        }
        release.properties = properties;
        let aware = release.pluggable_discovery_aware;
        let release_id = release.id();
        let name_from_properties = release.properties.get("name").map(str::to_string);

        // Load programmers.txt if present
        let programmers = PropertyMap::safe_load(&dir.join(crate::PROGRAMMERS_FILENAME))?;
        let release = self
            .packages
            .get_or_create_package(packager)
            .get_or_create_platform(architecture)
            .get_or_create_release(version);
        for (programmer_id, mut programmer_props) in programmers.first_level_of() {
            if !aware {
                legacy::convert_upload_tools_to_pluggable_discovery(&mut programmer_props);
            }
            release.programmers.insert(
                programmer_id.clone(),
                Programmer {
                    name: programmer_props.get("name").unwrap_or(&programmer_id).to_string(),
                    properties: programmer_props,
                    platform_release: release_id.clone(),
                },
            );
        }

        load_boards(release, packager, architecture, aware)?;

        if !aware {
            legacy::convert_legacy_platform_to_pluggable_discovery(release);
        }

        // Build pluggable monitor references
        for (protocol, reference) in release.properties.sub_tree("pluggable_monitor.required").iter()
        {
            let Some((ref_packager, name)) = reference.split_once(':') else {
                return Err(Error::MalformedReference(reference.to_string()));
            };
            if ref_packager.is_empty() || name.is_empty() || name.contains(':') {
                return Err(Error::MalformedReference(reference.to_string()));
            }
            debug!("Adding monitor tool {reference} for protocol {protocol}");
            release.monitors.insert(
                protocol.to_string(),
                MonitorDependency {
                    packager: ref_packager.to_string(),
                    name: name.to_string(),
                },
            );
        }

        // Monitor recipes used in development environments only
        for (protocol, recipe) in release.properties.sub_tree("pluggable_monitor.pattern").iter() {
            release
                .monitors_dev_recipes
                .insert(protocol.to_string(), recipe.to_string());
        }

        // The platform name comes from properties, the package index, or is
        // synthesized from the ids as a last resort.
        let platform = self
            .packages
            .get_or_create_package(packager)
            .get_or_create_platform(architecture);
        if platform.name.is_empty() {
            platform.name =
                name_from_properties.unwrap_or_else(|| format!("{packager}-{architecture}"));
        }

        Ok(())
    }
}

/// Load `boards.txt` (required) and `boards.local.txt` (optional) into the
/// release.
///
/// Boards whose menu entries reference a menu the platform never declared
/// are skipped; one aggregated error naming them all is returned at the end.
fn load_boards(
    release: &mut PlatformRelease,
    packager: &str,
    architecture: &str,
    aware: bool,
) -> Result<()> {
    let install_dir = release
        .install_dir
        .clone()
        .ok_or_else(|| Error::NotFound {
            kind: "install directory of",
            name: release.id(),
        })?;

    let mut boards_properties = PropertyMap::load(&install_dir.join(crate::BOARDS_FILENAME))?;
    boards_properties.merge(&PropertyMap::safe_load(&install_dir.join(crate::BOARDS_LOCAL_FILENAME))?);

    // The menu group declares menu labels, it is not a board. It is pulled
    // out first so boards can be validated against it regardless of where
    // it appears in the file.
    let groups = boards_properties.first_level_of();
    if let Some((_, menus)) = groups.iter().find(|(id, _)| id == "menu") {
        release.menus = menus.clone();
    }

    let mut skipped_boards = Vec::new();
    for (board_id, mut board_properties) in groups {
        if board_id == "menu" {
            continue;
        }

        // Menu keys look like menu.cpu.328p...; a menu name the platform
        // never declared marks the whole board as malformed.
        let references_unknown_menu = board_properties.keys().any(|key| {
            key.strip_prefix("menu.")
                .and_then(|rest| rest.split('.').next())
                .is_some_and(|menu_name| !release.menus.contains_key(menu_name))
        });
        if references_unknown_menu {
            skipped_boards.push(format!("{packager}:{architecture}:{board_id}"));
            continue;
        }

        if !aware {
            legacy::convert_vid_pid_identification_properties(&mut board_properties);
            legacy::convert_upload_tools_to_pluggable_discovery(&mut board_properties);
        }

        // The board id is made available as a property so configuration
        // files can condition on it.
        board_properties.set("_id", board_id.clone());
        release
            .get_or_create_board(&board_id)
            .properties
            .merge(&board_properties);
    }

    if !skipped_boards.is_empty() {
        return Err(Error::MalformedBoardOptions {
            boards: skipped_boards,
        });
    }
    Ok(())
}

/// Immediate non-hidden subdirectories of `path`, sorted by name.
pub(crate) fn sorted_subdirectories(path: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(path).map_err(|error| Error::ReadFailed {
        path: path.to_path_buf(),
        error,
    })?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir() && !dir_name(p).starts_with('.'))
        .collect();
    dirs.sort();
    Ok(dirs)
}

pub(crate) fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
