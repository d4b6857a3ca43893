// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Recipe hooks: user-supplied command lines run at fixed points of the
//! pipeline.
//!
//! A hook family is all properties `<prefix>.<K>.<suffix>`. Numeric `K`s run
//! in numeric order (zero-padded forms included); named `K`s run after them,
//! lexicographically. Whether a family tolerates failing commands is decided
//! at the call site.

use tracing::debug;

use crate::properties::PropertyMap;
use crate::Result;

use super::exec::{run_command, OutputSinks};

#[cfg(test)]
#[path = "./hooks_test.rs"]
mod hooks_test;

/// Collect the recipes of a hook family, ordered for execution.
pub fn collect_recipes(
    properties: &PropertyMap,
    prefix: &str,
    suffix: &str,
) -> Vec<(String, String)> {
    let full_prefix = format!("{prefix}.");
    let mut found: Vec<(Option<u64>, String, String)> = Vec::new();

    for (key, value) in properties.iter() {
        let Some(middle) = key
            .strip_prefix(&full_prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if middle.is_empty() || middle.contains('.') {
            continue;
        }
        found.push((middle.parse::<u64>().ok(), middle.to_string(), value.to_string()));
    }

    // Numeric keys first in numeric order, then named keys alphabetically
    found.sort_by(|a, b| match (&a.0, &b.0) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.1.cmp(&b.1)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    });

    found.into_iter().map(|(_, k, v)| (k, v)).collect()
}

/// Run every recipe of a hook family.
///
/// Families that continue on error log the failure and keep going; others
/// abort at the first failing command.
#[allow(clippy::too_many_arguments)]
pub async fn run_recipes_by_prefix_suffix(
    properties: &PropertyMap,
    prefix: &str,
    suffix: &str,
    sinks: &OutputSinks,
    verbose: bool,
    continue_on_error: bool,
    skip_if_only_updating_compilation_database: bool,
    only_updating_compilation_database: bool,
) -> Result<()> {
    if skip_if_only_updating_compilation_database && only_updating_compilation_database {
        if verbose {
            sinks.info(&format!("Skipping: {prefix}.*{suffix}"));
        }
        return Ok(());
    }

    for (name, pattern) in collect_recipes(properties, prefix, suffix) {
        debug!("Running hook {prefix}.{name}{suffix}");
        let command_line = properties.expand_props_in_string(&pattern);
        if command_line.trim().is_empty() {
            continue;
        }
        let argv = crate::properties::split_quoted_string(&command_line)?;
        if let Err(err) = run_command(&argv, sinks, verbose).await {
            if !continue_on_error {
                return Err(err);
            }
            sinks.warn(&format!("Hook {prefix}.{name}{suffix} failed: {err}"));
        }
    }
    Ok(())
}
