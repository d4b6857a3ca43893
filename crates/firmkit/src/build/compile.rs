// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Compilation of translation units.
//!
//! Each unit is independent: its object path is derived from its source
//! path, so parallel compilation never contends on outputs. Unchanged units
//! are skipped based on the dependency files the compiler emits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::properties::PropertyMap;
use crate::{Error, Result};

use super::exec::{expand_recipe, run_command};
use super::BuildSession;

#[cfg(test)]
#[path = "./compile_test.rs"]
mod compile_test;

/// Extensions that compile to objects, mapped to their recipe.
pub fn recipe_for_source(source: &Path) -> Option<&'static str> {
    match source.extension().and_then(|e| e.to_str())? {
        "c" => Some("recipe.c.o.pattern"),
        "cpp" | "cc" | "cxx" => Some("recipe.cpp.o.pattern"),
        "S" => Some("recipe.S.o.pattern"),
        _ => None,
    }
}

/// All compilable sources under `dir`, recursively, sorted.
pub fn gather_source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    if !dir.is_dir() {
        return Ok(sources);
    }
    let entries = std::fs::read_dir(dir).map_err(|error| Error::ReadFailed {
        path: dir.to_path_buf(),
        error,
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        {
            continue;
        }
        if path.is_dir() {
            sources.extend(gather_source_files(&path)?);
        } else if recipe_for_source(&path).is_some() {
            sources.push(path);
        }
    }
    Ok(sources)
}

/// The `includes` property recipes expand: one quoted `-I` per folder.
pub fn includes_property(includes: &[PathBuf]) -> String {
    includes
        .iter()
        .map(|p| format!("\"-I{}\"", p.display()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compile `sources` into `object_dir`, with at most `jobs` compilers
/// running at once. Object paths mirror the sources' paths relative to
/// `source_root`. Returns the object files in source order.
pub async fn compile_files(
    session: &BuildSession,
    sources: &[PathBuf],
    source_root: &Path,
    object_dir: &Path,
    includes: &[PathBuf],
    properties: &PropertyMap,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(object_dir)?;

    let includes_value = includes_property(includes);
    let warning_flags = properties
        .get(&format!("compiler.warning_flags.{}", session.warnings))
        .unwrap_or("")
        .to_string();

    let semaphore = Arc::new(Semaphore::new(session.jobs.max(1)));
    let mut objects = Vec::with_capacity(sources.len());
    let mut handles = Vec::new();

    for source in sources {
        session.check_cancelled()?;

        let Some(recipe_key) = recipe_for_source(source) else {
            continue;
        };
        let relative = source
            .strip_prefix(source_root)
            .unwrap_or_else(|_| Path::new(source.file_name().expect("source has a file name")));
        let object = object_dir.join(format!("{}.o", relative.display()));
        if let Some(parent) = object.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file_properties = properties.clone();
        file_properties.set("compiler.warning_flags", warning_flags.clone());
        file_properties.set("includes", includes_value.clone());
        file_properties.set("source_file", source.display().to_string());
        file_properties.set("object_file", object.display().to_string());

        let argv = expand_recipe(&file_properties, recipe_key)?;
        if let Some(db) = &session.compilation_database {
            db.add(&session.build_path, argv.clone(), source);
        }
        objects.push(object.clone());

        if session.only_update_compilation_database {
            if session.verbose {
                session
                    .sinks
                    .info(&format!("Skipping compile of: {}", source.display()));
            }
            continue;
        }

        if !session.clean && object_is_up_to_date(source, &object)? {
            if session.verbose {
                session
                    .sinks
                    .info(&format!("Using previously compiled file: {}", object.display()));
            }
            continue;
        }

        let semaphore = semaphore.clone();
        let sinks = session.sinks.clone();
        let verbose = session.verbose;
        let unit = source.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            run_command(&argv, &sinks, verbose)
                .await
                .map_err(|err| Error::Compile {
                    unit,
                    source: Box::new(err),
                })
        }));
    }

    let total = handles.len().max(1);
    let mut first_error = None;
    for (done, handle) in handles.into_iter().enumerate() {
        let result = handle.await.expect("compile task never panics");
        (session.sinks.progress)((done + 1) as f32 / total as f32);
        if let (Err(err), None) = (result, &first_error) {
            first_error = Some(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(objects),
    }
}

/// Whether the object is newer than its source and every dependency the
/// compiler recorded for it.
fn object_is_up_to_date(source: &Path, object: &Path) -> Result<bool> {
    let Ok(object_mtime) = std::fs::metadata(object).and_then(|m| m.modified()) else {
        return Ok(false);
    };
    let Ok(source_mtime) = std::fs::metadata(source).and_then(|m| m.modified()) else {
        return Ok(false);
    };
    if source_mtime > object_mtime {
        return Ok(false);
    }

    let dep_file = object.with_extension("d");
    let Ok(dep_text) = std::fs::read_to_string(&dep_file) else {
        return Ok(false);
    };
    for dependency in parse_dep_file(&dep_text) {
        let Ok(dep_mtime) = std::fs::metadata(&dependency).and_then(|m| m.modified()) else {
            debug!("Dependency missing, recompiling: {dependency}");
            return Ok(false);
        };
        if dep_mtime > object_mtime {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Dependency paths of a make-style `.d` file, target excluded.
fn parse_dep_file(text: &str) -> Vec<String> {
    // Join continuation lines, then protect escaped spaces while splitting
    let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
    let rest = match joined.split_once(':') {
        Some((_target, rest)) => rest,
        None => return Vec::new(),
    };
    rest.replace("\\ ", "\u{1}")
        .split_whitespace()
        .map(|token| token.replace('\u{1}', " "))
        .collect()
}
