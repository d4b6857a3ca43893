// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use miette::Result;

use firmkit::build::{self, BuildSession, CompilationDatabase, Sketch, WarningsLevel};
use firmkit::Fqbn;

use crate::{into_diagnostic, CatalogFlags};

/// Compile a sketch for a board.
#[derive(Parser)]
pub struct CmdCompile {
    #[clap(flatten)]
    catalog: CatalogFlags,

    /// Fully qualified board name, e.g. arduino:avr:uno
    #[clap(long, short)]
    fqbn: String,

    /// Build directory (defaults to <sketch>/build)
    #[clap(long)]
    build_path: Option<PathBuf>,

    /// Additional library root directories
    #[clap(long = "libraries", value_delimiter = ',')]
    libraries: Vec<PathBuf>,

    /// Shared core build cache directory
    #[clap(long)]
    build_cache_path: Option<PathBuf>,

    /// Parallel compiler processes (defaults to the CPU count)
    #[clap(long, short)]
    jobs: Option<usize>,

    /// Compiler warnings level: none, default, more, all
    #[clap(long, default_value = "none")]
    warnings: String,

    /// Wipe the build directory before building
    #[clap(long)]
    clean: bool,

    /// Only refresh compile_commands.json, compile nothing
    #[clap(long)]
    only_compilation_database: bool,

    /// Extra build properties, key=value
    #[clap(long = "build-property")]
    build_properties: Vec<String>,

    /// The sketch directory
    sketch: PathBuf,
}

impl CmdCompile {
    pub async fn run(&mut self, verbose: bool) -> Result<i32> {
        let fqbn: Fqbn = into_diagnostic(self.fqbn.parse())?;
        let warnings: WarningsLevel = into_diagnostic(self.warnings.parse())?;
        let sketch = into_diagnostic(Sketch::new_from_path(&self.sketch))?;

        let pm = self.catalog.load_package_manager();
        let resolved = into_diagnostic(pm.resolve_fqbn(&fqbn))?;

        let mut build_properties = resolved.build_properties.clone();
        for overlay in &self.build_properties {
            if let Some((key, value)) = overlay.split_once('=') {
                build_properties.set(key, value);
            }
        }

        let build_path = self
            .build_path
            .clone()
            .unwrap_or_else(|| sketch.path.join("build"));

        let mut session = BuildSession::new(build_path, sketch, fqbn, build_properties);
        session.platform_architecture = resolved.release.architecture.clone();
        session.library_dirs.extend(self.libraries.iter().cloned());
        session.hardware_dirs = pm.config().hardware_dirs.clone();
        session.builtin_tools_dirs = pm.config().builtin_tools_dirs.clone();
        session.custom_build_properties = self.build_properties.clone();
        session.core_build_cache_path = self.build_cache_path.clone();
        session.verbose = verbose;
        session.warnings = warnings;
        session.clean = self.clean;
        session.only_update_compilation_database = self.only_compilation_database;
        if let Some(jobs) = self.jobs {
            session.jobs = jobs.max(1);
        }
        session.compilation_database = Some(Arc::new(CompilationDatabase::new(
            session.build_path.join("compile_commands.json"),
        )));

        into_diagnostic(build::run(&mut session).await)?;
        Ok(0)
    }
}
