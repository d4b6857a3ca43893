// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Resolution of pluggable discovery tools into runnable command lines.
//!
//! Discovery executables speak a line-delimited JSON protocol on stdio; the
//! core only resolves which process to start and with which argv.

use tracing::debug;

use crate::catalog::PlatformRelease;
use crate::manager::PackageManager;
use crate::properties::split_quoted_string;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

/// Discovery tools every installation can rely on.
pub const BUILTIN_DISCOVERIES: [&str; 2] = ["builtin:serial-discovery", "builtin:mdns-discovery"];

/// A resolved discovery: its id and the command line that starts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryCommand {
    pub id: String,
    pub argv: Vec<String>,
}

impl PackageManager {
    /// Resolve the discoveries of every installed platform release plus the
    /// builtin ones. Resolution is best-effort: failures are returned next
    /// to the commands that did resolve.
    pub fn load_discoveries(&self) -> (Vec<DiscoveryCommand>, Vec<Error>) {
        let mut commands: Vec<DiscoveryCommand> = Vec::new();
        let mut errors = Vec::new();

        for release in self.packages().installed_platform_releases() {
            let (found, errs) = self.discoveries_from_release(release);
            commands.extend(found);
            errors.extend(errs);
        }

        for id in BUILTIN_DISCOVERIES {
            match self.resolve_discovery_tool(id) {
                Ok(cmd) => commands.push(cmd),
                Err(err) => errors.push(err),
            }
        }

        // The same discovery may be required by several platforms
        let mut seen = std::collections::HashSet::new();
        commands.retain(|cmd| seen.insert(cmd.id.clone()));

        (commands, errors)
    }

    /// Resolve a `packager:tool` discovery reference to its executable.
    pub fn resolve_discovery_tool(&self, id: &str) -> Result<DiscoveryCommand> {
        let tool = self.get_tool(id)?;
        let release = tool
            .latest_installed()
            .ok_or_else(|| Error::ToolNotInstalled(id.to_string()))?;
        let install_dir = release
            .install_dir
            .as_ref()
            .expect("latest_installed only yields installed releases");
        let executable = install_dir.join(&tool.name);
        debug!("Resolved discovery {id} to {}", executable.display());
        Ok(DiscoveryCommand {
            id: id.to_string(),
            argv: vec![executable.display().to_string()],
        })
    }

    /// Discoveries declared by one platform release.
    ///
    /// `pluggable_discovery.required` (single or indexed) references tools
    /// by `packager:name`. Any other `pluggable_discovery.<id>.pattern`
    /// entry is a direct command recipe, expanded against the release,
    /// its runtime paths, the per-discovery properties and the runtime
    /// paths of every tool the release requires.
    pub fn discoveries_from_release(
        &self,
        release: &PlatformRelease,
    ) -> (Vec<DiscoveryCommand>, Vec<Error>) {
        let mut commands = Vec::new();
        let mut errors = Vec::new();

        let discovery_properties = release.properties.sub_tree("pluggable_discovery");
        if discovery_properties.is_empty() {
            return (commands, errors);
        }

        for id in discovery_properties.extract_sub_index_lists("required") {
            match self.resolve_discovery_tool(&id) {
                Ok(cmd) => commands.push(cmd),
                Err(err) => errors.push(err),
            }
        }

        let direct: Vec<_> = discovery_properties
            .first_level_of()
            .into_iter()
            .filter(|(id, _)| id != "required")
            .collect();
        if direct.is_empty() {
            return (commands, errors);
        }

        // Tool runtime paths are only needed to expand direct patterns
        let required_tools = match self.tools_required_from_platform_release(release) {
            Ok(tools) => tools,
            Err(err) => {
                errors.push(err);
                Vec::new()
            }
        };

        for (discovery_id, props) in direct {
            let Some(pattern) = props.get("pattern") else {
                errors.push(Error::MissingPattern(discovery_id));
                continue;
            };

            let mut configuration = release.properties.clone();
            configuration.merge(&release.runtime_properties());
            configuration.merge(&props);
            for tool in &required_tools {
                configuration.merge(&tool.runtime_properties());
            }

            let command_line = configuration.expand_props_in_string(pattern);
            match split_quoted_string(&command_line) {
                Ok(argv) => commands.push(DiscoveryCommand {
                    id: discovery_id,
                    argv,
                }),
                Err(err) => errors.push(err),
            }
        }

        (commands, errors)
    }
}
