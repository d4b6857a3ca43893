// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::Path;

use super::*;

fn props(text: &str) -> PropertyMap {
    PropertyMap::parse(text, Path::new("test.txt")).unwrap()
}

#[rstest]
fn test_collect_recipes_numeric_order() {
    let map = props(
        "recipe.hooks.prebuild.10.pattern=ten\nrecipe.hooks.prebuild.2.pattern=two\nrecipe.hooks.prebuild.1.pattern=one\n",
    );
    let recipes = collect_recipes(&map, "recipe.hooks.prebuild", ".pattern");
    let values: Vec<_> = recipes.iter().map(|(_, v)| v.as_str()).collect();
    assert_eq!(values, vec!["one", "two", "ten"]);
}

#[rstest]
fn test_collect_recipes_zero_padded_numeric() {
    let map = props(
        "recipe.hooks.prebuild.01.pattern=first\nrecipe.hooks.prebuild.02.pattern=second\n",
    );
    let recipes = collect_recipes(&map, "recipe.hooks.prebuild", ".pattern");
    let values: Vec<_> = recipes.iter().map(|(_, v)| v.as_str()).collect();
    assert_eq!(values, vec!["first", "second"]);
}

#[rstest]
fn test_collect_recipes_named_after_numeric() {
    let map = props(
        "recipe.objcopy.hex.pattern=hex\nrecipe.objcopy.eep.pattern=eep\nrecipe.objcopy.0.pattern=zero\n",
    );
    let recipes = collect_recipes(&map, "recipe.objcopy", ".pattern");
    let names: Vec<_> = recipes.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(names, vec!["0", "eep", "hex"]);
}

#[rstest]
fn test_collect_recipes_ignores_other_suffixes_and_nesting() {
    let map = props(
        "recipe.hooks.prebuild.1.pattern=yes\nrecipe.hooks.prebuild.1.pattern.windows=no\nrecipe.hooks.postbuild.1.pattern=no\n",
    );
    let recipes = collect_recipes(&map, "recipe.hooks.prebuild", ".pattern");
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].1, "yes");
}

#[tokio::test]
async fn test_run_recipes_aborts_on_error() {
    let map = props("recipe.hooks.prebuild.1.pattern=false\nrecipe.hooks.prebuild.2.pattern=true\n");
    let sinks = OutputSinks::discard();
    let result = run_recipes_by_prefix_suffix(
        &map,
        "recipe.hooks.prebuild",
        ".pattern",
        &sinks,
        false,
        false,
        false,
        false,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_recipes_continue_on_error() {
    let map =
        props("recipe.hooks.postbuild.1.pattern=false\nrecipe.hooks.postbuild.2.pattern=true\n");
    let sinks = OutputSinks::discard();
    let result = run_recipes_by_prefix_suffix(
        &map,
        "recipe.hooks.postbuild",
        ".pattern",
        &sinks,
        false,
        true,
        false,
        false,
    )
    .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_run_recipes_skipped_when_only_updating_compilation_database() {
    let map = props("recipe.hooks.postbuild.1.pattern=false\n");
    let sinks = OutputSinks::discard();
    let result = run_recipes_by_prefix_suffix(
        &map,
        "recipe.hooks.postbuild",
        ".pattern",
        &sinks,
        false,
        false,
        true,
        true,
    )
    .await;
    assert!(result.is_ok(), "skipped hooks never run their commands");
}

#[tokio::test]
async fn test_run_recipes_empty_pattern_is_skipped() {
    let map = props("recipe.hooks.prebuild.1.pattern={undefined.hook}\n");
    let mut empty = map.clone();
    empty.set("undefined.hook", "");
    let sinks = OutputSinks::discard();
    let result = run_recipes_by_prefix_suffix(
        &empty,
        "recipe.hooks.prebuild",
        ".pattern",
        &sinks,
        false,
        false,
        false,
        false,
    )
    .await;
    assert!(result.is_ok());
}
