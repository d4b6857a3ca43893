// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use clap::Parser;
use miette::Result;

use firmkit::build::{self, BuildSession, OutputSinks, Sketch};
use firmkit::Fqbn;

use crate::{into_diagnostic, CatalogFlags};

/// Print the preprocessed sketch source.
#[derive(Parser)]
pub struct CmdPreprocess {
    #[clap(flatten)]
    catalog: CatalogFlags,

    /// Fully qualified board name, e.g. arduino:avr:uno
    #[clap(long, short)]
    fqbn: String,

    /// Build directory (defaults to <sketch>/build)
    #[clap(long)]
    build_path: Option<PathBuf>,

    /// The sketch directory
    sketch: PathBuf,
}

impl CmdPreprocess {
    pub async fn run(&mut self) -> Result<i32> {
        let fqbn: Fqbn = into_diagnostic(self.fqbn.parse())?;
        let sketch = into_diagnostic(Sketch::new_from_path(&self.sketch))?;

        let pm = self.catalog.load_package_manager();
        let resolved = into_diagnostic(pm.resolve_fqbn(&fqbn))?;

        let build_path = self
            .build_path
            .clone()
            .unwrap_or_else(|| sketch.path.join("build"));

        let mut session =
            BuildSession::new(build_path, sketch, fqbn, resolved.build_properties.clone());
        session.platform_architecture = resolved.release.architecture.clone();
        // Messages go to stderr so the preprocessed source stays clean on
        // stdout
        session.sinks = OutputSinks::discard();

        let preprocessed = into_diagnostic(build::run_preprocess(&mut session).await)?;
        print!("{preprocessed}");
        Ok(0)
    }
}
