// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

//! The build orchestrator.
//!
//! A build is two ordered pipelines of tagged steps interpreted over a
//! [`BuildSession`]. The primary pipeline stops at the first error but the
//! secondary (reporting) pipeline always runs; the final outcome is the
//! primary error if any, else the secondary one.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::fqbn::Fqbn;
use crate::properties::PropertyMap;
use crate::{Error, Result};

pub mod cmake;
pub mod compile;
pub mod compiledb;
pub mod core;
pub mod detector;
pub mod exec;
pub mod hooks;
pub mod link;
pub mod options;
pub mod preprocess;
pub mod sizer;
pub mod sketch;

pub use compiledb::CompilationDatabase;
pub use detector::{Library, LibraryDetector};
pub use exec::OutputSinks;
pub use sizer::SectionSize;
pub use sketch::Sketch;

#[cfg(test)]
#[path = "./mod_test.rs"]
mod mod_test;

/// Compiler warning verbosity, selecting one of the platform's
/// `compiler.warning_flags.*` sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningsLevel {
    #[default]
    None,
    Default,
    More,
    All,
}

impl std::fmt::Display for WarningsLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningsLevel::None => "none",
            WarningsLevel::Default => "default",
            WarningsLevel::More => "more",
            WarningsLevel::All => "all",
        };
        write!(f, "{s}")
    }
}

impl FromStr for WarningsLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(WarningsLevel::None),
            "default" => Ok(WarningsLevel::Default),
            "more" => Ok(WarningsLevel::More),
            "all" => Ok(WarningsLevel::All),
            other => Err(Error::InvalidRecipe {
                key: "warnings level".to_string(),
                reason: format!("unknown level {other:?}"),
            }),
        }
    }
}

/// Everything a build reads and everything it accumulates.
///
/// Inputs are set up front and never change during the build; output fields
/// start empty and are only appended to by the steps that own them.
#[derive(Debug)]
pub struct BuildSession {
    // Inputs
    pub build_path: PathBuf,
    pub sketch: Sketch,
    pub fqbn: Fqbn,
    /// Cloned, fully resolved properties; mutations never touch the catalog.
    pub build_properties: PropertyMap,
    pub platform_architecture: String,
    /// Roots scanned for libraries, in priority order.
    pub library_dirs: Vec<PathBuf>,
    /// Recorded in the build options summary.
    pub hardware_dirs: Vec<PathBuf>,
    pub builtin_tools_dirs: Vec<PathBuf>,
    pub custom_build_properties: Vec<String>,
    pub core_build_cache_path: Option<PathBuf>,
    pub jobs: usize,
    pub verbose: bool,
    pub warnings: WarningsLevel,
    pub clean: bool,
    pub only_update_compilation_database: bool,
    pub sinks: OutputSinks,
    pub compilation_database: Option<Arc<CompilationDatabase>>,

    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,

    // Outputs
    pub line_offset: usize,
    pub detector: Option<LibraryDetector>,
    pub include_folders: Vec<PathBuf>,
    pub sketch_object_files: Vec<PathBuf>,
    pub library_object_files: Vec<PathBuf>,
    pub core_object_files: Vec<PathBuf>,
    pub core_archive: Option<PathBuf>,
    pub executable_sections_size: Vec<SectionSize>,
    pub build_options: Option<String>,
    pub build_options_previous: Option<String>,
}

impl BuildSession {
    pub fn new(
        build_path: impl Into<PathBuf>,
        sketch: Sketch,
        fqbn: Fqbn,
        mut build_properties: PropertyMap,
    ) -> Self {
        let build_path = build_path.into();
        let platform_architecture = fqbn.architecture.clone();

        build_properties.set("build.path", build_path.display().to_string());
        build_properties.set("build.project_name", sketch.project_name());
        build_properties.set("build.source.path", sketch.path.display().to_string());
        build_properties.set("sketch_path", sketch.path.display().to_string());

        // Derive core and variant paths from the platform layout unless the
        // platform spelled them out
        if let Some(platform_path) = build_properties.get("runtime.platform.path") {
            let platform_path = platform_path.to_string();
            if !build_properties.contains_key("build.core.path") {
                if let Some(core) = build_properties.get("build.core") {
                    let core = core.rsplit(':').next().unwrap_or(core);
                    build_properties
                        .set("build.core.path", format!("{platform_path}/cores/{core}"));
                }
            }
            if !build_properties.contains_key("build.variant.path") {
                if let Some(variant) = build_properties.get("build.variant") {
                    let variant = variant.rsplit(':').next().unwrap_or(variant);
                    build_properties.set(
                        "build.variant.path",
                        format!("{platform_path}/variants/{variant}"),
                    );
                }
            }
        }

        let mut library_dirs = Vec::new();
        if let Some(platform_path) = build_properties.get("runtime.platform.path") {
            let bundled = PathBuf::from(platform_path).join("libraries");
            if bundled.is_dir() {
                library_dirs.push(bundled);
            }
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        BuildSession {
            build_path,
            sketch,
            fqbn,
            build_properties,
            platform_architecture,
            library_dirs,
            hardware_dirs: Vec::new(),
            builtin_tools_dirs: Vec::new(),
            custom_build_properties: Vec::new(),
            core_build_cache_path: None,
            jobs: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            verbose: false,
            warnings: WarningsLevel::default(),
            clean: false,
            only_update_compilation_database: false,
            sinks: OutputSinks::stdio(),
            compilation_database: None,
            cancel_tx,
            cancel_rx,
            line_offset: 0,
            detector: None,
            include_folders: Vec::new(),
            sketch_object_files: Vec::new(),
            library_object_files: Vec::new(),
            core_object_files: Vec::new(),
            core_archive: None,
            executable_sections_size: Vec::new(),
            build_options: None,
            build_options_previous: None,
        }
    }

    pub fn sketch_build_path(&self) -> PathBuf {
        self.build_path.join("sketch")
    }

    pub fn libraries_build_path(&self) -> PathBuf {
        self.build_path.join("libraries")
    }

    pub fn core_build_path(&self) -> PathBuf {
        self.build_path.join("core")
    }

    pub fn core_path(&self) -> Result<PathBuf> {
        self.build_properties
            .get("build.core.path")
            .map(PathBuf::from)
            .ok_or_else(|| Error::NotFound {
                kind: "property",
                name: "build.core.path".to_string(),
            })
    }

    pub fn variant_path(&self) -> Option<PathBuf> {
        self.build_properties
            .get("build.variant.path")
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
    }

    /// Signal cancellation; stages check between commands.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if *self.cancel_rx.borrow() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn build_options_summary(&self) -> options::BuildOptions {
        options::BuildOptions {
            hardware_folders: options::join_paths(&self.hardware_dirs),
            builtin_tools_folders: options::join_paths(&self.builtin_tools_dirs),
            sketch_location: self.sketch.path.display().to_string(),
            fqbn: self.fqbn.to_string(),
            custom_build_properties: self.custom_build_properties.join(","),
            compiler_optimization_flags: self
                .build_properties
                .get("compiler.optimization_flags")
                .unwrap_or("")
                .to_string(),
        }
    }
}

/// One step of the pipeline. The interpreter in [`run`] gives each variant
/// its inputs from the session and stores its outputs back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    BuildOptions,
    Hook {
        prefix: &'static str,
        abort_on_error: bool,
        skip_for_compilation_database: bool,
    },
    /// Verbose-only progress message.
    Log(&'static str),
    PrepareSketch,
    DetectLibraries,
    WarnArchIncompatibleLibraries,
    PreprocessSketch,
    CompileSketch,
    RemoveUnusedCompiledLibraries,
    CompileLibraries,
    CompileCore,
    Link,
    MergeBootloader,
}

const fn prebuild_hook(prefix: &'static str) -> Step {
    Step::Hook {
        prefix,
        abort_on_error: true,
        skip_for_compilation_database: false,
    }
}

const fn postbuild_hook(prefix: &'static str) -> Step {
    Step::Hook {
        prefix,
        abort_on_error: false,
        skip_for_compilation_database: true,
    }
}

/// The primary pipeline, in execution order.
pub fn primary_steps() -> Vec<Step> {
    vec![
        Step::BuildOptions,
        prebuild_hook("recipe.hooks.prebuild"),
        Step::PrepareSketch,
        Step::Log("Detecting libraries used..."),
        Step::DetectLibraries,
        Step::WarnArchIncompatibleLibraries,
        Step::Log("Generating function prototypes..."),
        Step::PreprocessSketch,
        Step::Log("Compiling sketch..."),
        prebuild_hook("recipe.hooks.sketch.prebuild"),
        Step::CompileSketch,
        postbuild_hook("recipe.hooks.sketch.postbuild"),
        Step::Log("Compiling libraries..."),
        prebuild_hook("recipe.hooks.libraries.prebuild"),
        Step::RemoveUnusedCompiledLibraries,
        Step::CompileLibraries,
        postbuild_hook("recipe.hooks.libraries.postbuild"),
        Step::Log("Compiling core..."),
        prebuild_hook("recipe.hooks.core.prebuild"),
        Step::CompileCore,
        postbuild_hook("recipe.hooks.core.postbuild"),
        Step::Log("Linking everything together..."),
        prebuild_hook("recipe.hooks.linking.prelink"),
        Step::Link,
        postbuild_hook("recipe.hooks.linking.postlink"),
        prebuild_hook("recipe.hooks.objcopy.preobjcopy"),
        postbuild_hook("recipe.objcopy"),
        postbuild_hook("recipe.hooks.objcopy.postobjcopy"),
        Step::MergeBootloader,
        postbuild_hook("recipe.hooks.postbuild"),
    ]
}

/// The reduced pipeline of preprocess-only mode.
pub fn preprocess_steps() -> Vec<Step> {
    vec![
        Step::BuildOptions,
        prebuild_hook("recipe.hooks.prebuild"),
        Step::PrepareSketch,
        Step::DetectLibraries,
        Step::WarnArchIncompatibleLibraries,
        Step::PreprocessSketch,
    ]
}

async fn execute_step(session: &mut BuildSession, step: Step) -> Result<()> {
    debug!("Running step: {step:?}");
    match step {
        Step::BuildOptions => {
            let previous = options::read_previous_build_options(&session.build_path)?;
            let current = session.build_options_summary().to_json();
            options::wipe_build_path_if_build_options_changed(
                session.clean,
                &session.build_path,
                &current,
                previous.as_deref(),
                || {
                    if previous.is_some() {
                        session
                            .sinks
                            .info("Build options changed, rebuilding all");
                    }
                },
            )?;
            options::store_build_options(&session.build_path, &current)?;
            session.build_options = Some(current);
            session.build_options_previous = previous;
            Ok(())
        }

        Step::Hook {
            prefix,
            abort_on_error,
            skip_for_compilation_database,
        } => {
            hooks::run_recipes_by_prefix_suffix(
                &session.build_properties,
                prefix,
                ".pattern",
                &session.sinks,
                session.verbose,
                !abort_on_error,
                skip_for_compilation_database,
                session.only_update_compilation_database,
            )
            .await
        }

        Step::Log(message) => {
            if session.verbose {
                session.sinks.info(message);
            }
            Ok(())
        }

        Step::PrepareSketch => {
            session.line_offset =
                sketch::prepare_sketch_build_path(&session.sketch, &session.sketch_build_path())?;
            Ok(())
        }

        Step::DetectLibraries => {
            let core_path = session.core_path()?;
            let variant_path = session.variant_path();
            let mut detector = LibraryDetector::new(&session.library_dirs);
            detector.find_includes(
                &session.sketch_build_path(),
                &core_path,
                variant_path.as_deref(),
            )?;
            session.include_folders =
                detector.include_folders(&core_path, variant_path.as_deref());
            session.detector = Some(detector);
            Ok(())
        }

        Step::WarnArchIncompatibleLibraries => {
            if let Some(detector) = &session.detector {
                let override_check = session
                    .build_properties
                    .contains_key("architecture.override_check");
                detector.warn_about_arch_incompatible_libraries(
                    &session.platform_architecture,
                    override_check,
                    &session.sinks,
                );
            }
            Ok(())
        }

        Step::PreprocessSketch => {
            let properties = session.build_properties.clone();
            let includes = session.include_folders.clone();
            preprocess::preprocess_sketch(session, &properties, &includes).await
        }

        Step::CompileSketch => {
            let sketch_build_path = session.sketch_build_path();
            let sources = compile::gather_source_files(&sketch_build_path)?;
            let objects = compile::compile_files(
                session,
                &sources,
                &sketch_build_path,
                &sketch_build_path,
                &session.include_folders,
                &session.build_properties,
            )
            .await?;
            session.sketch_object_files = objects;
            Ok(())
        }

        Step::RemoveUnusedCompiledLibraries => {
            if let Some(detector) = &session.detector {
                detector.remove_unused_compiled_libraries(&session.libraries_build_path())?;
            }
            Ok(())
        }

        Step::CompileLibraries => {
            let libraries: Vec<Library> = session
                .detector
                .as_ref()
                .map(|d| d.imported_libraries().to_vec())
                .unwrap_or_default();
            let mut objects = Vec::new();
            for library in libraries {
                let sources = compile::gather_source_files(&library.source_dir)?;
                let object_dir = session.libraries_build_path().join(&library.name);
                objects.extend(
                    compile::compile_files(
                        session,
                        &sources,
                        &library.source_dir,
                        &object_dir,
                        &session.include_folders,
                        &session.build_properties,
                    )
                    .await?,
                );
            }
            session.library_object_files = objects;
            Ok(())
        }

        Step::CompileCore => {
            let (variant_objects, archive) = core::compile_core(
                session,
                &session.include_folders,
                &session.build_properties,
            )
            .await?;
            session.core_object_files = variant_objects;
            session.core_archive = Some(archive);
            Ok(())
        }

        Step::Link => {
            let archive = session.core_archive.clone().unwrap_or_default();
            link::link(
                session,
                &session.build_properties,
                &session.sketch_object_files,
                &session.library_object_files,
                &session.core_object_files,
                &archive,
            )
            .await
        }

        Step::MergeBootloader => sketch::merge_sketch_with_bootloader(
            session.only_update_compilation_database,
            &session.build_path,
            &session.sketch.project_name(),
            &session.build_properties,
            &session.sinks,
        ),
    }
}

async fn run_steps(session: &mut BuildSession, steps: Vec<Step>) -> Result<()> {
    let total = steps.len().max(1);
    for (done, step) in steps.into_iter().enumerate() {
        session.check_cancelled()?;
        execute_step(session, step).await?;
        (session.sinks.progress)((done + 1) as f32 / total as f32);
    }
    Ok(())
}

/// Run the full build: the primary pipeline, then the reporting pipeline.
pub async fn run(session: &mut BuildSession) -> Result<()> {
    std::fs::create_dir_all(&session.build_path)?;

    let primary_error = run_steps(session, primary_steps()).await.err();

    if let Some(db) = &session.compilation_database {
        if let Err(err) = db.save() {
            session
                .sinks
                .warn(&format!("Could not write compilation database: {err}"));
        }
    }

    let secondary_error = run_reporting_pipeline(session, primary_error.is_some()).await.err();

    match primary_error {
        Some(err) => Err(err),
        None => secondary_error.map_or(Ok(()), Err),
    }
}

/// The secondary pipeline: reporting that runs no matter how the primary
/// pipeline ended.
async fn run_reporting_pipeline(session: &mut BuildSession, build_failed: bool) -> Result<()> {
    if let Some(detector) = &session.detector {
        detector.print_used_and_not_used_libraries(build_failed, &session.sinks);

        if session.verbose {
            for library in detector.imported_libraries() {
                let architectures = if library.architectures.is_empty() {
                    "unspecified".to_string()
                } else {
                    library.architectures.join(", ")
                };
                session.sinks.info(&format!(
                    "Library {} declares architectures: {architectures}",
                    library.name
                ));
            }
        }
    }

    cmake::export_cmake_project(
        session,
        build_failed,
        &session.build_properties,
        &session.include_folders,
    )?;

    let sections =
        sizer::run_sizer(session, build_failed, &session.build_properties.clone()).await?;
    session.executable_sections_size = sections;

    Ok(())
}

/// Preprocess-only mode: run the reduced pipeline and return the
/// preprocessed sketch text.
pub async fn run_preprocess(session: &mut BuildSession) -> Result<String> {
    std::fs::create_dir_all(&session.build_path)?;
    run_steps(session, preprocess_steps()).await?;

    let merged = session
        .sketch_build_path()
        .join(session.sketch.merged_source_name());
    std::fs::read_to_string(&merged).map_err(|error| Error::ReadFailed {
        path: merged,
        error,
    })
}
