// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! Execution of expanded recipe command lines.

use std::io::Write;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::process::Command;

use crate::properties::{split_quoted_string, PropertyMap};
use crate::{Error, Result};

/// Where build output and human-readable messages go.
///
/// The writers are shared because compilation fans out into parallel tasks
/// that all report through the same sinks.
#[derive(Clone)]
pub struct OutputSinks {
    pub stdout: Arc<Mutex<Box<dyn Write + Send>>>,
    pub stderr: Arc<Mutex<Box<dyn Write + Send>>>,
    pub info: Arc<dyn Fn(&str) + Send + Sync>,
    pub warn: Arc<dyn Fn(&str) + Send + Sync>,
    /// Fraction of the current pipeline completed, 0.0 to 1.0.
    pub progress: Arc<dyn Fn(f32) + Send + Sync>,
}

impl OutputSinks {
    /// Sinks wired to the process stdio.
    pub fn stdio() -> Self {
        OutputSinks {
            stdout: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
            stderr: Arc::new(Mutex::new(Box::new(std::io::stderr()))),
            info: Arc::new(|msg| println!("{msg}")),
            warn: Arc::new(|msg| eprintln!("{msg}")),
            progress: Arc::new(|_| {}),
        }
    }

    /// Sinks that discard everything.
    pub fn discard() -> Self {
        OutputSinks {
            stdout: Arc::new(Mutex::new(Box::new(std::io::sink()))),
            stderr: Arc::new(Mutex::new(Box::new(std::io::sink()))),
            info: Arc::new(|_| {}),
            warn: Arc::new(|_| {}),
            progress: Arc::new(|_| {}),
        }
    }

    pub fn info(&self, msg: &str) {
        (self.info)(msg);
    }

    pub fn warn(&self, msg: &str) {
        (self.warn)(msg);
    }

    pub fn write_stdout(&self, data: &[u8]) {
        let _ = self.stdout.lock().expect("poisoned").write_all(data);
    }

    pub fn write_stderr(&self, data: &[u8]) {
        let _ = self.stderr.lock().expect("poisoned").write_all(data);
    }
}

impl std::fmt::Debug for OutputSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSinks").finish_non_exhaustive()
    }
}

/// Expand a recipe against the given properties and split it into argv.
/// A missing or empty recipe is an error; optional recipes are checked by
/// their callers before expansion.
pub fn expand_recipe(properties: &PropertyMap, recipe_key: &str) -> Result<Vec<String>> {
    let pattern = properties
        .get(recipe_key)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| Error::InvalidRecipe {
            key: recipe_key.to_string(),
            reason: "recipe is undefined".to_string(),
        })?;
    let command_line = properties.expand_props_in_string(pattern);
    split_quoted_string(&command_line)
}

/// Run a command, streaming its output to the sinks.
///
/// The command line is echoed to the info sink in verbose mode, matching
/// what the compilers themselves print.
pub async fn run_command(argv: &[String], sinks: &OutputSinks, verbose: bool) -> Result<()> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    if verbose {
        sinks.info(&argv.join(" "));
    }

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    sinks.write_stdout(&output.stdout);
    sinks.write_stderr(&output.stderr);

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program: program.clone(),
            exit_code: output.status.code(),
        });
    }
    Ok(())
}

/// Run a command and return its captured stdout.
pub async fn run_command_capture(
    argv: &[String],
    sinks: &OutputSinks,
    verbose: bool,
) -> Result<Vec<u8>> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(Vec::new());
    };

    if verbose {
        sinks.info(&argv.join(" "));
    }

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    sinks.write_stderr(&output.stderr);

    if !output.status.success() {
        return Err(Error::CommandFailed {
            program: program.clone(),
            exit_code: output.status.code(),
        });
    }
    Ok(output.stdout)
}
