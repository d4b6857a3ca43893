// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The clang compilation database (`compile_commands.json`).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./compiledb_test.rs"]
mod compiledb_test;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompileCommand {
    pub directory: String,
    pub arguments: Vec<String>,
    pub file: String,
}

/// Accumulates one entry per compiled translation unit. Entries are recorded
/// even for units whose compilation is skipped or fails, so editors get a
/// complete database either way.
#[derive(Debug)]
pub struct CompilationDatabase {
    file: PathBuf,
    entries: Mutex<Vec<CompileCommand>>,
}

impl CompilationDatabase {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        CompilationDatabase {
            file: file.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, directory: &Path, arguments: Vec<String>, file: &Path) {
        self.entries.lock().expect("poisoned").push(CompileCommand {
            directory: directory.display().to_string(),
            arguments,
            file: file.display().to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush the accumulated entries to disk.
    pub fn save(&self) -> Result<()> {
        let entries = self.entries.lock().expect("poisoned");
        let json = serde_json::to_string_pretty(&*entries)
            .expect("compile commands always serialize");
        std::fs::write(&self.file, json).map_err(|error| Error::ReadFailed {
            path: self.file.clone(),
            error,
        })
    }

    pub fn load(path: &Path) -> Result<Vec<CompileCommand>> {
        let text = std::fs::read_to_string(path).map_err(|error| Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        })?;
        serde_json::from_str(&text).map_err(|error| Error::InvalidIndex {
            path: path.to_path_buf(),
            error,
        })
    }
}
