// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! firmkit - Embedded Platform Catalog and Build Orchestration CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_boards;
mod cmd_compile;
mod cmd_platforms;
mod cmd_preprocess;

use cmd_boards::CmdBoards;
use cmd_compile::CmdCompile;
use cmd_platforms::CmdPlatforms;
use cmd_preprocess::CmdPreprocess;

#[derive(Parser)]
#[clap(
    name = "firmkit",
    about = "Embedded platform catalog and build orchestration",
    version,
    long_about = "Load installed hardware platforms and build sketches against them"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Where platforms and bundled tools are searched.
#[derive(Parser, Clone, Debug, Default)]
pub struct CatalogFlags {
    /// Hardware root directories, highest priority first
    #[clap(long = "hardware-dirs", env = "FIRMKIT_HARDWARE_DIRS", value_delimiter = ',')]
    pub hardware_dirs: Vec<PathBuf>,

    /// Built-in tool bundle directories
    #[clap(long = "tools-dirs", env = "FIRMKIT_TOOLS_DIRS", value_delimiter = ',')]
    pub tools_dirs: Vec<PathBuf>,
}

impl CatalogFlags {
    /// Load the catalog, reporting per-directory problems as warnings.
    pub fn load_package_manager(&self) -> firmkit::PackageManager {
        let mut builder = firmkit::PackageManagerBuilder::new(firmkit::Config {
            hardware_dirs: self.hardware_dirs.clone(),
            builtin_tools_dirs: self.tools_dirs.clone(),
        });
        for err in builder.load_hardware() {
            tracing::warn!("{err}");
        }
        builder.build()
    }
}

#[derive(Subcommand)]
enum Command {
    /// List installed platform releases
    Platforms(CmdPlatforms),

    /// Show the resolved build properties of a board
    Boards(CmdBoards),

    /// Compile a sketch
    Compile(CmdCompile),

    /// Print the preprocessed sketch source
    Preprocess(CmdPreprocess),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .init();

        let verbose = self.logging.verbose > 0;

        // Dispatch to command
        match self.cmd {
            Command::Platforms(mut cmd) => cmd.run().await,
            Command::Boards(mut cmd) => cmd.run().await,
            Command::Compile(mut cmd) => cmd.run(verbose).await,
            Command::Preprocess(mut cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run().await?;
    std::process::exit(code);
}

/// Adapt a firmkit error into a terminal diagnostic.
pub fn into_diagnostic<T>(result: firmkit::Result<T>) -> Result<T> {
    result.map_err(miette::Report::new)
}
