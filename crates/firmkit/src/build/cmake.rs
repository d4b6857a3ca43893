// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Export of a CMake project describing the build, for IDE integration.

use std::path::PathBuf;

use crate::properties::PropertyMap;
use crate::Result;

use super::compile::gather_source_files;
use super::BuildSession;

/// Write `cmake/CMakeLists.txt` into the build directory, listing the
/// sources, include folders and defines of the finished build. There is
/// nothing to describe when the build failed or was never compiled.
pub fn export_cmake_project(
    session: &BuildSession,
    build_failed: bool,
    properties: &PropertyMap,
    includes: &[PathBuf],
) -> Result<()> {
    if build_failed || session.only_update_compilation_database {
        return Ok(());
    }

    let cmake_dir = session.build_path.join("cmake");
    std::fs::create_dir_all(&cmake_dir)?;

    let mut sources = vec![session
        .sketch_build_path()
        .join(session.sketch.merged_source_name())];
    sources.extend(gather_source_files(&session.sketch_build_path())?);
    if let Some(detector) = &session.detector {
        for library in detector.imported_libraries() {
            sources.extend(gather_source_files(&library.source_dir)?);
        }
    }
    sources.dedup();

    let mut out = String::new();
    out.push_str("cmake_minimum_required(VERSION 3.10)\n");
    out.push_str(&format!("project({})\n\n", sanitize(&session.sketch.name)));

    if let Some(mcu) = properties.get("build.mcu") {
        out.push_str(&format!("add_compile_definitions(TARGET_MCU=\"{mcu}\")\n"));
    }
    if let Some(f_cpu) = properties.get("build.f_cpu") {
        out.push_str(&format!("add_compile_definitions(F_CPU={f_cpu})\n"));
    }
    out.push('\n');

    for include in includes {
        out.push_str(&format!("include_directories({:?})\n", include.display().to_string()));
    }
    out.push('\n');

    out.push_str(&format!("add_executable({}\n", sanitize(&session.sketch.name)));
    for source in &sources {
        out.push_str(&format!("    {:?}\n", source.display().to_string()));
    }
    out.push_str(")\n");

    std::fs::write(cmake_dir.join("CMakeLists.txt"), out)?;
    Ok(())
}

/// CMake target names cannot contain spaces or most punctuation.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
