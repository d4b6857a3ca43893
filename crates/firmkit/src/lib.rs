// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! firmkit - Embedded Platform Catalog and Build Orchestration
//!
//! This crate is the core of the firmkit toolchain. It loads installed
//! hardware platforms (board support packages) from layered filesystem
//! locations into an in-memory catalog, and turns a sketch plus its
//! libraries into a linked binary ready for flashing.
//!
//! # Overview
//!
//! Platforms are described by plain `key=value` property files
//! (`platform.txt`, `boards.txt`, ...) with `{placeholder}` expansion; the
//! whole build is driven by expanding the platform's recipe properties.
//! Loading is a two-phase affair: a mutable [`PackageManagerBuilder`] scans
//! the hardware directories best-effort, then freezes into a
//! [`PackageManager`] that concurrent readers can query.
//!
//! Building runs two ordered pipelines over a [`build::BuildSession`]: the
//! compile pipeline stops at the first error, while the reporting pipeline
//! (library usage, CMake export, size check) always runs.
//!
//! # Example
//!
//! ```no_run
//! use firmkit::{Config, Fqbn, PackageManagerBuilder};
//!
//! let mut builder = PackageManagerBuilder::new(Config {
//!     hardware_dirs: vec!["/home/me/.firmkit/packages".into()],
//!     builtin_tools_dirs: vec![],
//! });
//! for err in builder.load_hardware() {
//!     eprintln!("skipped: {err}");
//! }
//! let pm = builder.build();
//!
//! let fqbn: Fqbn = "arduino:avr:uno".parse().unwrap();
//! let resolved = pm.resolve_fqbn(&fqbn).unwrap();
//! println!("{}", resolved.board.name());
//! ```

pub mod build;
pub mod catalog;
pub mod discovery;
pub mod error;
pub mod fqbn;
pub mod index;
pub mod legacy;
pub mod loader;
pub mod manager;
pub mod properties;
pub mod tools;
pub mod version;

pub use catalog::{
    Board, MonitorDependency, Package, Packages, Platform, PlatformRelease, Programmer, Tool,
    ToolDependency, ToolRelease,
};
pub use discovery::{DiscoveryCommand, BUILTIN_DISCOVERIES};
pub use error::{Error, Result};
pub use fqbn::Fqbn;
pub use index::PackageIndex;
pub use manager::{Config, PackageManager, PackageManagerBuilder, ResolvedBoard};
pub use properties::{split_quoted_string, PropertyMap};
pub use version::RelaxedVersion;

/// Well-known filename for platform properties.
pub const PLATFORM_FILENAME: &str = "platform.txt";

/// Well-known filename for local platform overrides.
pub const PLATFORM_LOCAL_FILENAME: &str = "platform.local.txt";

/// Well-known filename for board definitions.
pub const BOARDS_FILENAME: &str = "boards.txt";

/// Well-known filename for local board overrides.
pub const BOARDS_LOCAL_FILENAME: &str = "boards.local.txt";

/// Well-known filename for programmer definitions.
pub const PROGRAMMERS_FILENAME: &str = "programmers.txt";
