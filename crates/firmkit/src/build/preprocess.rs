// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Prototype generation for sketches.
//!
//! Sketches may call functions before defining them, without declaring
//! prototypes. An external ctags pass over the (optionally
//! compiler-preprocessed) merged sketch finds the function definitions, and
//! the missing prototypes are injected after the last `#include` preceding
//! the user's code.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::properties::PropertyMap;
use crate::Result;

use super::compile::includes_property;
use super::exec::{expand_recipe, run_command, run_command_capture};
use super::BuildSession;

#[cfg(test)]
#[path = "./preprocess_test.rs"]
mod preprocess_test;

const CTAGS_TARGET: &str = "ctags_target_for_gcc_minus_e.cpp";

/// Generate prototypes for the merged sketch and inject them in place.
pub async fn preprocess_sketch(
    session: &BuildSession,
    properties: &PropertyMap,
    includes: &[PathBuf],
) -> Result<()> {
    if session.only_update_compilation_database {
        return Ok(());
    }

    let merged_path = session
        .sketch_build_path()
        .join(session.sketch.merged_source_name());
    let preproc_dir = session.build_path.join("preproc");
    std::fs::create_dir_all(&preproc_dir)?;
    let ctags_target = preproc_dir.join(CTAGS_TARGET);

    // Let the compiler resolve macros and includes first when the platform
    // provides a preprocessing recipe
    if properties.get("recipe.preproc.macros").is_some() {
        let mut props = properties.clone();
        props.set("includes", includes_property(includes));
        props.set("source_file", merged_path.display().to_string());
        props.set(
            "preprocessed_file_path",
            ctags_target.display().to_string(),
        );
        let argv = expand_recipe(&props, "recipe.preproc.macros")?;
        run_command(&argv, &session.sinks, session.verbose).await?;
    } else {
        std::fs::copy(&merged_path, &ctags_target)?;
    }

    let Some(argv) = ctags_command(properties, &ctags_target) else {
        debug!("No ctags tool available, skipping prototype generation");
        return Ok(());
    };
    let output = run_command_capture(&argv, &session.sinks, session.verbose).await?;
    let prototypes = parse_ctags_output(&String::from_utf8_lossy(&output));
    if prototypes.is_empty() {
        return Ok(());
    }

    let text = std::fs::read_to_string(&merged_path)?;
    let injected = inject_prototypes(
        &text,
        session.line_offset,
        &prototypes,
        &session.sketch.main_file.display().to_string(),
    );
    std::fs::write(&merged_path, injected)?;
    Ok(())
}

/// The ctags invocation: the platform recipe when declared, the bundled
/// ctags otherwise.
fn ctags_command(properties: &PropertyMap, target: &Path) -> Option<Vec<String>> {
    if properties.get("tools.ctags.pattern").is_some() {
        let mut props = properties.clone();
        props.set("ctags_target_file_path", target.display().to_string());
        return expand_recipe(&props, "tools.ctags.pattern").ok();
    }

    let ctags_path = properties.get("runtime.tools.ctags.path")?;
    Some(vec![
        format!("{ctags_path}/ctags"),
        "-u".to_string(),
        "--language-force=c++".to_string(),
        "-f".to_string(),
        "-".to_string(),
        "--c++-kinds=svpf".to_string(),
        "--fields=KSTtzns".to_string(),
        "--line-directives".to_string(),
        target.display().to_string(),
    ])
}

/// Extract function prototypes from ctags' tab-separated output.
fn parse_ctags_output(output: &str) -> Vec<String> {
    let mut prototypes = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            continue;
        }
        let name = fields[0];
        if name.contains("::") || name.starts_with('!') {
            continue;
        }

        let mut kind = "";
        let mut signature = None;
        let mut returntype = None;
        for field in &fields[3..] {
            if let Some(value) = field.strip_prefix("kind:") {
                kind = value;
            } else if let Some(value) = field.strip_prefix("signature:") {
                signature = Some(value);
            } else if let Some(value) = field.strip_prefix("returntype:") {
                returntype = Some(value);
            }
        }
        if kind != "function" {
            continue;
        }
        let (Some(signature), Some(returntype)) = (signature, returntype) else {
            continue;
        };

        let prototype = format!("{returntype} {name}{signature};");
        if !prototypes.contains(&prototype) {
            prototypes.push(prototype);
        }
    }
    prototypes
}

/// Inject prototypes after the last `#include` that precedes the user's
/// code, at or after `line_offset`, followed by a `#line` marker restoring
/// the original numbering.
fn inject_prototypes(
    text: &str,
    line_offset: usize,
    prototypes: &[String],
    main_file: &str,
) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let insertion = insertion_index(&lines, line_offset);

    let mut out: Vec<String> = lines[..insertion].iter().map(|l| l.to_string()).collect();
    out.extend(prototypes.iter().cloned());
    let user_line = insertion.saturating_sub(line_offset) + 1;
    out.push(format!("#line {user_line} {main_file:?}"));
    out.extend(lines[insertion..].iter().map(|l| l.to_string()));

    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}

/// Index right after the last `#include` of the user's leading directive
/// block, or `line_offset` when the user code starts immediately.
fn insertion_index(lines: &[&str], line_offset: usize) -> usize {
    let mut last_include = None;
    for (i, line) in lines.iter().enumerate().skip(line_offset) {
        let trimmed = line.trim_start();
        if trimmed.is_empty()
            || trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
        {
            continue;
        }
        if trimmed.starts_with('#') {
            let directive = trimmed.trim_start_matches('#').trim_start();
            if directive.starts_with("include") {
                last_include = Some(i);
            }
            continue;
        }
        break;
    }
    last_include.map(|i| i + 1).unwrap_or(line_offset)
}
