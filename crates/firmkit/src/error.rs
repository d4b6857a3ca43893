// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for firmkit operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with firmkit Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading platforms or running a build.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// A hardware root or platform path is not a directory
    #[error("{0:?} is not a directory")]
    #[diagnostic(code(firmkit::not_a_directory))]
    NotADirectory(PathBuf),

    /// Failed to read a file or directory
    #[error("failed to read {path:?}")]
    #[diagnostic(code(firmkit::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Invalid line in a property file
    #[error("invalid line {line} in {path:?}: missing '='")]
    #[diagnostic(
        code(firmkit::invalid_property_line),
        help("property files contain one key=value per line; lines starting with '#' are comments")
    )]
    InvalidPropertyLine { path: PathBuf, line: usize },

    /// Invalid JSON in a package index file
    #[error("invalid package index {path:?}")]
    #[diagnostic(code(firmkit::invalid_index))]
    InvalidIndex {
        path: PathBuf,
        #[source]
        error: serde_json::Error,
    },

    /// A version string did not parse as a semantic version
    #[error("invalid version {value:?} in {context}")]
    #[diagnostic(
        code(firmkit::invalid_version),
        help("platform versions must be full semantic versions like 1.8.6")
    )]
    InvalidVersion { value: String, context: String },

    /// Invalid fully qualified board name
    #[error("invalid FQBN {fqbn:?}: {reason}")]
    #[diagnostic(
        code(firmkit::invalid_fqbn),
        help("an FQBN looks like packager:architecture:board or packager:architecture:board:opt=value")
    )]
    InvalidFqbn { fqbn: String, reason: String },

    /// A tool or monitor reference is not of the form packager:name
    #[error("invalid tool reference {0:?}")]
    #[diagnostic(
        code(firmkit::malformed_reference),
        help("tool references look like builtin:serial-discovery")
    )]
    MalformedReference(String),

    /// One or more boards referenced a menu the platform never declared
    #[error("skipping loading of boards {}: malformed custom board options", boards.join(", "))]
    #[diagnostic(code(firmkit::malformed_board_options))]
    MalformedBoardOptions { boards: Vec<String> },

    /// Tool not present in the catalog
    #[error("tool {0} not found")]
    #[diagnostic(code(firmkit::unknown_tool))]
    UnknownTool(String),

    /// Tool is known but has no installed release
    #[error("tool {0} not installed")]
    #[diagnostic(code(firmkit::tool_not_installed))]
    ToolNotInstalled(String),

    /// A board, platform or package lookup failed
    #[error("{kind} {name} not found")]
    #[diagnostic(code(firmkit::not_found))]
    NotFound { kind: &'static str, name: String },

    /// A discovery declared no command pattern
    #[error("no pattern found for discovery {0}")]
    #[diagnostic(code(firmkit::missing_pattern))]
    MissingPattern(String),

    /// A recipe property value is malformed
    #[error("invalid recipe {key}: {reason}")]
    #[diagnostic(code(firmkit::invalid_recipe))]
    InvalidRecipe { key: String, reason: String },

    /// Mismatched quotes while splitting a command line
    #[error("invalid quoting in command line: {0}")]
    #[diagnostic(code(firmkit::quote_error))]
    Quote(String),

    /// An external command exited with a failure status
    #[error("command {program:?} failed{}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    #[diagnostic(code(firmkit::command_failed))]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
    },

    /// Compilation of a translation unit failed
    #[error("error compiling {unit:?}")]
    #[diagnostic(code(firmkit::compile_error))]
    Compile {
        unit: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The link stage failed
    #[error("error linking sketch")]
    #[diagnostic(code(firmkit::link_error))]
    Link {
        #[source]
        source: Box<Error>,
    },

    /// The linked image exceeds a board-declared maximum
    #[error("{region} section exceeds available space on the board ({size} > {maximum} bytes)")]
    #[diagnostic(
        code(firmkit::size_exceeded),
        help("reduce the sketch size or select a board with more memory")
    )]
    SizeExceeded {
        region: &'static str,
        size: u64,
        maximum: u64,
    },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    #[diagnostic(code(firmkit::cancelled))]
    Cancelled,

    /// Platform load failure with the offending platform named
    #[error("loading platform {platform}")]
    #[diagnostic(code(firmkit::platform_load_failed))]
    PlatformLoad {
        platform: String,
        #[source]
        source: Box<Error>,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(firmkit::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error with the platform it was raised for.
    pub fn for_platform(self, platform: impl Into<String>) -> Self {
        Error::PlatformLoad {
            platform: platform.into(),
            source: Box::new(self),
        }
    }
}
