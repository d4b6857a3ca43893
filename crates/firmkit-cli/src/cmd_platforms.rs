// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use miette::Result;

use crate::CatalogFlags;

/// List installed platform releases.
#[derive(Parser)]
pub struct CmdPlatforms {
    #[clap(flatten)]
    catalog: CatalogFlags,

    /// Also list boards of each platform
    #[clap(long)]
    boards: bool,
}

impl CmdPlatforms {
    pub async fn run(&mut self) -> Result<i32> {
        let pm = self.catalog.load_package_manager();

        for (_, package) in pm.packages().iter() {
            for platform in package.platforms.values() {
                for release in platform.releases.values() {
                    if release.install_dir.is_none() {
                        continue;
                    }
                    let mut flags = Vec::new();
                    if release.is_ide_bundled {
                        flags.push("bundled");
                    }
                    if release.manually_installed {
                        flags.push("manual");
                    }
                    let flags = if flags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", flags.join(", "))
                    };
                    println!(
                        "{}:{} {} \"{}\"{flags}",
                        platform.packager, platform.architecture, release.version, platform.name
                    );
                    if self.boards {
                        for board in release.boards.values() {
                            println!("  {}:{}:{} {}", platform.packager, platform.architecture, board.board_id, board.name());
                        }
                    }
                }
            }
        }

        Ok(0)
    }
}
