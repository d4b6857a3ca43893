// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Sketch layout, source merging and the bootloader merge stage.
//!
//! A sketch is a directory with a primary `.ino` named after the directory,
//! optional sibling `.ino` files, and optional additional C/C++ sources.
//! All `.ino` files compile as a single translation unit: they are
//! concatenated into one `.cpp` with `#line` markers pointing back at the
//! originals.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::properties::PropertyMap;
use crate::{Error, Result};

use super::exec::OutputSinks;

#[cfg(test)]
#[path = "./sketch_test.rs"]
mod sketch_test;

/// Additional source extensions copied next to the merged sketch.
const ADDITIONAL_EXTENSIONS: [&str; 6] = ["c", "cpp", "S", "h", "hpp", "tpp"];

/// End-of-file record of an Intel hex image.
const HEX_EOF_RECORD: &str = ":00000001FF";

#[derive(Debug, Clone)]
pub struct Sketch {
    /// The sketch directory.
    pub path: PathBuf,
    /// Directory name, which the primary file must match.
    pub name: String,
    pub main_file: PathBuf,
    /// Sibling `.ino` files, sorted by name.
    pub other_ino_files: Vec<PathBuf>,
    /// Non-ino sources, copied verbatim into the sketch build path.
    pub additional_files: Vec<PathBuf>,
}

impl Sketch {
    /// Analyze a sketch directory.
    pub fn new_from_path(path: &Path) -> Result<Self> {
        let path = dunce::canonicalize(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        if !path.is_dir() {
            return Err(Error::NotADirectory(path));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let main_file = path.join(format!("{name}.ino"));
        if !main_file.is_file() {
            return Err(Error::NotFound {
                kind: "main sketch file",
                name: main_file.display().to_string(),
            });
        }

        let mut other_ino_files = Vec::new();
        let mut additional_files = Vec::new();
        collect_sketch_files(&path, &path, &main_file, &mut other_ino_files, &mut additional_files)?;
        other_ino_files.sort();
        additional_files.sort();

        Ok(Sketch {
            path,
            name,
            main_file,
            other_ino_files,
            additional_files,
        })
    }

    /// Name of the merged translation unit, e.g. `Blink.ino.cpp`.
    pub fn merged_source_name(&self) -> String {
        format!("{}.ino.cpp", self.name)
    }

    /// The project name recipes see as `build.project_name`.
    pub fn project_name(&self) -> String {
        format!("{}.ino", self.name)
    }
}

fn collect_sketch_files(
    root: &Path,
    dir: &Path,
    main_file: &Path,
    ino: &mut Vec<PathBuf>,
    additional: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|error| Error::ReadFailed {
        path: dir.to_path_buf(),
        error,
    })? {
        let entry = entry.map_err(|error| Error::ReadFailed {
            path: dir.to_path_buf(),
            error,
        })?;
        let path = entry.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            // Only src/ participates in the build, other subdirectories
            // (data/, extras/...) are payload
            if dir == root && name == "src" {
                collect_sketch_files(root, &path, main_file, ino, additional)?;
            }
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext == "ino" {
            if path != main_file {
                ino.push(path);
            }
        } else if ADDITIONAL_EXTENSIONS.contains(&ext) {
            additional.push(path);
        }
    }
    Ok(())
}

/// Merge the sketch sources into the build path.
///
/// Returns the line offset of the user's code within the generated file,
/// which the preprocessor needs to place prototypes correctly.
pub fn prepare_sketch_build_path(sketch: &Sketch, sketch_build_path: &Path) -> Result<usize> {
    std::fs::create_dir_all(sketch_build_path)?;

    let mut merged = String::new();
    merged.push_str("#include <Arduino.h>\n");
    merged.push_str(&format!("#line 1 {:?}\n", sketch.main_file.display().to_string()));
    let line_offset = 2;

    let main_source = read_source(&sketch.main_file)?;
    merged.push_str(&main_source);
    if !main_source.ends_with('\n') {
        merged.push('\n');
    }

    for ino in &sketch.other_ino_files {
        merged.push_str(&format!("#line 1 {:?}\n", ino.display().to_string()));
        let source = read_source(ino)?;
        merged.push_str(&source);
        if !source.ends_with('\n') {
            merged.push('\n');
        }
    }

    std::fs::write(sketch_build_path.join(sketch.merged_source_name()), merged)?;

    // Additional sources are copied preserving their place relative to the
    // sketch directory
    for file in &sketch.additional_files {
        let relative = file.strip_prefix(&sketch.path).unwrap_or(file);
        let target = sketch_build_path.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(file, &target)?;
    }

    debug!(
        "Prepared sketch build path at {} (line offset {line_offset})",
        sketch_build_path.display()
    );
    Ok(line_offset)
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
        path: path.to_path_buf(),
        error,
    })
}

/// Merge the linked sketch image with the platform bootloader.
///
/// Runs only when the platform declares a bootloader (`bootloader.noblink`
/// or `bootloader.file`). The merged image is written next to the sketch
/// image as `<project>.with_bootloader.hex`.
pub fn merge_sketch_with_bootloader(
    only_update_compilation_database: bool,
    build_path: &Path,
    project_name: &str,
    properties: &PropertyMap,
    sinks: &OutputSinks,
) -> Result<()> {
    if only_update_compilation_database {
        return Ok(());
    }

    let Some(bootloader_file) = properties
        .get("bootloader.noblink")
        .or_else(|| properties.get("bootloader.file"))
    else {
        return Ok(());
    };
    let bootloader_file = properties.expand_props_in_string(bootloader_file);

    let sketch_image = build_path.join(format!("{project_name}.hex"));
    if !sketch_image.exists() {
        return Ok(());
    }

    let bootloader_path = PathBuf::from(
        properties.expand_props_in_string("{runtime.platform.path}/bootloaders/"),
    )
    .join(&bootloader_file);
    if !bootloader_path.exists() {
        sinks.warn(&format!(
            "Bootloader file specified but missing: {}",
            bootloader_path.display()
        ));
        return Ok(());
    }

    let sketch_hex = read_source(&sketch_image)?;
    let bootloader_hex = read_source(&bootloader_path)?;

    // Drop the sketch EOF record so the bootloader records continue the image
    let mut merged = String::new();
    for line in sketch_hex.lines() {
        if line.trim() == HEX_EOF_RECORD {
            continue;
        }
        merged.push_str(line);
        merged.push('\n');
    }
    for line in bootloader_hex.lines() {
        merged.push_str(line);
        merged.push('\n');
    }

    let merged_path = build_path.join(format!("{project_name}.with_bootloader.hex"));
    std::fs::write(&merged_path, merged)?;
    Ok(())
}
