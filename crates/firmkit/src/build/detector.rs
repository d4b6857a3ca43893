// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Library detection by include scanning.
//!
//! Include directives are collected from the merged sketch and resolved
//! against the known library roots; sources of newly imported libraries are
//! scanned in turn, until the imported set stabilizes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{Error, Result};

use super::exec::OutputSinks;

#[cfg(test)]
#[path = "./detector_test.rs"]
mod detector_test;

static INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).expect("static regex"));

/// Source extensions scanned for include directives.
const SCANNED_EXTENSIONS: [&str; 7] = ["c", "cpp", "h", "hpp", "S", "ino", "tpp"];

/// The architecture wildcard in `library.properties`.
const ARCH_ANY: &str = "*";

/// An on-disk library.
#[derive(Debug, Clone)]
pub struct Library {
    pub name: String,
    pub install_dir: PathBuf,
    /// Where the sources live: `src/` for the modern layout, the root for
    /// the legacy flat layout.
    pub source_dir: PathBuf,
    /// Declared compatible architectures; empty means undeclared.
    pub architectures: Vec<String>,
}

impl Library {
    /// Read a library from its directory. `library.properties` is optional;
    /// without it the directory is a legacy flat-layout library named after
    /// itself.
    pub fn new_from_dir(dir: &Path) -> Result<Self> {
        let mut name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut architectures = Vec::new();

        let properties_file = dir.join("library.properties");
        if properties_file.is_file() {
            let props = crate::properties::PropertyMap::load(&properties_file)?;
            if let Some(declared) = props.get("name") {
                name = declared.to_string();
            }
            if let Some(archs) = props.get("architectures") {
                architectures = archs.split(',').map(|a| a.trim().to_string()).collect();
            }
        }

        let src = dir.join("src");
        let source_dir = if src.is_dir() { src } else { dir.to_path_buf() };

        Ok(Library {
            name,
            install_dir: dir.to_path_buf(),
            source_dir,
            architectures,
        })
    }

    /// Whether the library provides the given header at its source root.
    fn provides_header(&self, header: &str) -> bool {
        self.source_dir.join(header).is_file()
    }

    /// Whether the library declares compatibility with `architecture`.
    pub fn supports_architecture(&self, architecture: &str) -> bool {
        self.architectures.is_empty()
            || self
                .architectures
                .iter()
                .any(|a| a == ARCH_ANY || a == architecture)
    }
}

/// Resolves sketch includes to libraries and tracks the imported set.
#[derive(Debug)]
pub struct LibraryDetector {
    candidates: Vec<Library>,
    imported: Vec<Library>,
}

impl LibraryDetector {
    /// Scan the library roots for candidate libraries. Later roots lose to
    /// earlier ones on name conflict.
    pub fn new(library_dirs: &[PathBuf]) -> Self {
        let mut candidates: Vec<Library> = Vec::new();
        for root in library_dirs {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.is_dir()
                        && !p
                            .file_name()
                            .is_some_and(|n| n.to_string_lossy().starts_with('.'))
                })
                .collect();
            dirs.sort();
            for dir in dirs {
                match Library::new_from_dir(&dir) {
                    Ok(library) => {
                        if !candidates.iter().any(|c| c.name == library.name) {
                            candidates.push(library);
                        }
                    }
                    Err(err) => debug!("Skipping library {}: {err}", dir.display()),
                }
            }
        }
        LibraryDetector {
            candidates,
            imported: Vec::new(),
        }
    }

    pub fn imported_libraries(&self) -> &[Library] {
        &self.imported
    }

    /// Include folders for compilation: core, variant, then one per
    /// imported library, in import order.
    pub fn include_folders(
        &self,
        core_path: &Path,
        variant_path: Option<&Path>,
    ) -> Vec<PathBuf> {
        let mut folders = vec![core_path.to_path_buf()];
        if let Some(variant) = variant_path {
            folders.push(variant.to_path_buf());
        }
        folders.extend(self.imported.iter().map(|l| l.source_dir.clone()));
        folders
    }

    /// Detect the libraries the sketch uses, to a fixed point.
    ///
    /// Headers satisfied by the core or variant are not library includes.
    pub fn find_includes(
        &mut self,
        sketch_build_path: &Path,
        core_path: &Path,
        variant_path: Option<&Path>,
    ) -> Result<()> {
        let mut scanned_headers: HashSet<String> = HashSet::new();
        let mut pending_sources = gather_scannable_sources(sketch_build_path)?;

        while !pending_sources.is_empty() {
            let mut new_headers = Vec::new();
            for source in pending_sources.drain(..) {
                for header in includes_of(&source)? {
                    if scanned_headers.insert(header.clone()) {
                        new_headers.push(header);
                    }
                }
            }

            for header in new_headers {
                if core_path.join(&header).is_file()
                    || variant_path.is_some_and(|v| v.join(&header).is_file())
                {
                    continue;
                }
                let Some(library) = self.resolve_header(&header) else {
                    continue;
                };
                if self.imported.iter().any(|l| l.name == library.name) {
                    continue;
                }
                debug!("Using library {} for {header}", library.name);
                pending_sources.extend(gather_scannable_sources(&library.source_dir)?);
                self.imported.push(library);
            }
        }
        Ok(())
    }

    /// Pick the library providing `header`, preferring an exact name match.
    fn resolve_header(&self, header: &str) -> Option<Library> {
        let stem = Path::new(header)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let providers: Vec<&Library> = self
            .candidates
            .iter()
            .filter(|l| l.provides_header(header))
            .collect();
        providers
            .iter()
            .find(|l| l.name == stem)
            .or_else(|| providers.first())
            .map(|l| (*l).clone())
    }

    /// Report which libraries were used, flagging candidates that were not
    /// only when the build failed.
    pub fn print_used_and_not_used_libraries(&self, build_failed: bool, sinks: &OutputSinks) {
        for library in &self.imported {
            sinks.info(&format!(
                "Using library {} in folder: {}",
                library.name,
                library.install_dir.display()
            ));
        }
        if build_failed {
            for library in &self.candidates {
                if !self.imported.iter().any(|l| l.name == library.name) {
                    sinks.warn(&format!("Not used: {}", library.install_dir.display()));
                }
            }
        }
    }

    /// Warn about imported libraries that do not declare support for the
    /// target architecture. `architecture.override_check` silences this.
    pub fn warn_about_arch_incompatible_libraries(
        &self,
        architecture: &str,
        override_check: bool,
        sinks: &OutputSinks,
    ) {
        if override_check {
            return;
        }
        for library in &self.imported {
            if !library.supports_architecture(architecture) {
                sinks.warn(&format!(
                    "WARNING: library {} claims to run on {} architecture(s) and may be incompatible with your current board which runs on {} architecture(s).",
                    library.name,
                    library.architectures.join(", "),
                    architecture
                ));
            }
        }
    }

    /// Remove compiled libraries whose source library is no longer
    /// imported, so stale objects never reach the linker.
    pub fn remove_unused_compiled_libraries(&self, libraries_build_path: &Path) -> Result<()> {
        if !libraries_build_path.is_dir() {
            return Ok(());
        }
        for entry in
            std::fs::read_dir(libraries_build_path).map_err(|error| Error::ReadFailed {
                path: libraries_build_path.to_path_buf(),
                error,
            })?
        {
            let entry = entry.map_err(|error| Error::ReadFailed {
                path: libraries_build_path.to_path_buf(),
                error,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !self.imported.iter().any(|l| l.name == name) {
                debug!("Removing stale compiled library: {}", path.display());
                std::fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }
}

/// Include directive targets of one source file.
fn includes_of(source: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(source).map_err(|error| Error::ReadFailed {
        path: source.to_path_buf(),
        error,
    })?;
    Ok(INCLUDE_RE
        .captures_iter(&text)
        .map(|cap| cap[1].to_string())
        .collect())
}

/// All scannable sources under `dir`, recursively.
fn gather_scannable_sources(dir: &Path) -> Result<Vec<PathBuf>> {
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
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            sources.extend(gather_scannable_sources(&path)?);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SCANNED_EXTENSIONS.contains(&e))
        {
            sources.push(path);
        }
    }
    Ok(sources)
}
