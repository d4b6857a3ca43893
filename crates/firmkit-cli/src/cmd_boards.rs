// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use miette::Result;

use firmkit::Fqbn;

use crate::{into_diagnostic, CatalogFlags};

/// Show the resolved build properties of a board.
#[derive(Parser)]
pub struct CmdBoards {
    #[clap(flatten)]
    catalog: CatalogFlags,

    /// Fully qualified board name, e.g. arduino:avr:uno:cpu=atmega328p
    #[clap(long, short)]
    fqbn: String,
}

impl CmdBoards {
    pub async fn run(&mut self) -> Result<i32> {
        let fqbn: Fqbn = into_diagnostic(self.fqbn.parse())?;
        let pm = self.catalog.load_package_manager();
        let resolved = into_diagnostic(pm.resolve_fqbn(&fqbn))?;

        println!("board: {}", resolved.board.name());
        println!(
            "platform: {}:{}@{}",
            resolved.release.packager, resolved.release.architecture, resolved.release.version
        );
        print!("{}", resolved.build_properties);

        Ok(0)
    }
}
