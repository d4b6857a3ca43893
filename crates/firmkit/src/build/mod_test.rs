// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::Path;
use tempfile::TempDir;

use super::*;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// A sketch plus a fake platform whose recipes are all `true`, so a full
/// pipeline runs without any real toolchain.
fn session_for(tmp: &TempDir) -> BuildSession {
    let sketch_dir = tmp.path().join("Blink");
    write(
        &sketch_dir.join("Blink.ino"),
        "void setup() {}\nvoid loop() {}\n",
    );
    let sketch = Sketch::new_from_path(&sketch_dir).unwrap();

    let core_dir = tmp.path().join("platform/cores/arduino");
    write(&core_dir.join("wiring.c"), "int wiring(void) { return 0; }\n");
    write(&core_dir.join("Arduino.h"), "\n");

    let mut props = PropertyMap::new();
    props.set(
        "runtime.platform.path",
        tmp.path().join("platform").display().to_string(),
    );
    props.set("build.core", "arduino");
    props.set("recipe.c.o.pattern", "true");
    props.set("recipe.cpp.o.pattern", "true");
    props.set("recipe.S.o.pattern", "true");
    props.set("recipe.ar.pattern", "true");
    props.set("recipe.c.combine.pattern", "true");

    let fqbn: Fqbn = "acme:avr:uno".parse().unwrap();
    let mut session = BuildSession::new(tmp.path().join("build"), sketch, fqbn, props);
    session.sinks = OutputSinks::discard();
    session.jobs = 2;
    session
}

#[tokio::test]
async fn test_full_pipeline_with_stub_recipes() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);

    run(&mut session).await.unwrap();

    assert_eq!(session.line_offset, 2);
    assert!(session.build_path.join("build.options.json").exists());
    assert!(session
        .build_path
        .join("sketch/Blink.ino.cpp")
        .exists());
    assert!(session.core_archive.is_some());
    assert!(session.build_path.join("cmake/CMakeLists.txt").exists());
    // One object per translation unit, paths derived from the sources
    assert_eq!(session.sketch_object_files.len(), 1);
    assert!(session.sketch_object_files[0]
        .display()
        .to_string()
        .ends_with("Blink.ino.cpp.o"));
}

#[tokio::test]
async fn test_build_option_change_wipes_build_dir() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);

    std::fs::create_dir_all(&session.build_path).unwrap();
    write(&session.build_path.join("stale.o"), "stale");
    write(
        &session.build_path.join("build.options.json"),
        r#"{ "old": "old" }"#,
    );

    run(&mut session).await.unwrap();

    assert!(session.build_path.exists());
    assert!(!session.build_path.join("stale.o").exists());
    assert_eq!(
        session.build_options_previous.as_deref(),
        Some(r#"{ "old": "old" }"#)
    );
}

#[tokio::test]
async fn test_no_previous_options_deletes_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);

    std::fs::create_dir_all(&session.build_path).unwrap();
    write(&session.build_path.join("not_stale.o"), "keep");

    run(&mut session).await.unwrap();

    assert!(session.build_path.join("not_stale.o").exists());
    assert!(session.build_options_previous.is_none());
}

#[tokio::test]
async fn test_failing_prebuild_hook_fails_build_but_writes_options() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);
    session
        .build_properties
        .set("recipe.hooks.prebuild.0.pattern", "false");

    let result = run(&mut session).await;
    assert!(result.is_err(), "prebuild hooks abort the build");
    // The primary pipeline already recorded the options summary
    assert!(session.build_path.join("build.options.json").exists());
    // The stages after the failing hook never ran
    assert!(session.sketch_object_files.is_empty());
}

#[tokio::test]
async fn test_failing_postbuild_hook_is_tolerated() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);
    session
        .build_properties
        .set("recipe.hooks.postbuild.0.pattern", "false");

    run(&mut session).await.unwrap();
}

#[tokio::test]
async fn test_cancellation_propagates() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);
    session.cancel();

    match run(&mut session).await {
        Err(crate::Error::Cancelled) => {}
        other => panic!("expected Cancelled, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_preprocess_only_mode_returns_merged_source() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);

    let text = run_preprocess(&mut session).await.unwrap();
    assert!(text.starts_with("#include <Arduino.h>"));
    assert!(text.contains("void setup() {}"));
    // The full compile stages did not run
    assert!(session.sketch_object_files.is_empty());
}

#[tokio::test]
async fn test_compilation_database_flushed_between_pipelines() {
    let tmp = TempDir::new().unwrap();
    let mut session = session_for(&tmp);
    let db_path = session.build_path.join("compile_commands.json");
    session.compilation_database =
        Some(std::sync::Arc::new(CompilationDatabase::new(&db_path)));
    session.only_update_compilation_database = true;

    run(&mut session).await.unwrap();

    let entries = CompilationDatabase::load(&db_path).unwrap();
    assert!(
        !entries.is_empty(),
        "sketch and core units appear in the database"
    );
}

#[rstest]
fn test_primary_steps_order_hooks_around_phases() {
    let steps = primary_steps();
    let hook_position = |prefix: &str| {
        steps
            .iter()
            .position(|s| matches!(s, Step::Hook { prefix: p, .. } if *p == prefix))
            .unwrap_or_else(|| panic!("missing hook {prefix}"))
    };

    assert!(hook_position("recipe.hooks.prebuild") < hook_position("recipe.hooks.sketch.prebuild"));
    let compile_sketch = steps.iter().position(|s| *s == Step::CompileSketch).unwrap();
    assert!(hook_position("recipe.hooks.sketch.prebuild") < compile_sketch);
    assert!(compile_sketch < hook_position("recipe.hooks.sketch.postbuild"));
    let link = steps.iter().position(|s| *s == Step::Link).unwrap();
    assert!(hook_position("recipe.hooks.linking.prelink") < link);
    assert!(link < hook_position("recipe.hooks.linking.postlink"));
    assert_eq!(
        steps.last(),
        Some(&Step::Hook {
            prefix: "recipe.hooks.postbuild",
            abort_on_error: false,
            skip_for_compilation_database: true,
        })
    );
}

#[rstest]
fn test_warnings_level_round_trip() {
    for (text, level) in [
        ("none", WarningsLevel::None),
        ("default", WarningsLevel::Default),
        ("more", WarningsLevel::More),
        ("all", WarningsLevel::All),
    ] {
        assert_eq!(text.parse::<WarningsLevel>().unwrap(), level);
        assert_eq!(level.to_string(), text);
    }
    assert!("loud".parse::<WarningsLevel>().is_err());
}
