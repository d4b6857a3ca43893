// Copyright (c) Contributors to the firmkit project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use super::*;

#[rstest]
#[case("a.c", Some("recipe.c.o.pattern"))]
#[case("a.cpp", Some("recipe.cpp.o.pattern"))]
#[case("a.cc", Some("recipe.cpp.o.pattern"))]
#[case("a.S", Some("recipe.S.o.pattern"))]
#[case("a.h", None)]
#[case("README.md", None)]
fn test_recipe_for_source(#[case] file: &str, #[case] expected: Option<&str>) {
    assert_eq!(recipe_for_source(Path::new(file)), expected);
}

#[rstest]
fn test_includes_property_quotes_each_folder() {
    let includes = vec!["/core path".into(), "/libs/Servo/src".into()];
    assert_eq!(
        includes_property(&includes),
        "\"-I/core path\" \"-I/libs/Servo/src\""
    );
}

#[rstest]
fn test_gather_source_files_recursive_sorted() {
    let tmp = TempDir::new().unwrap();
    let write = |p: &str| {
        let path = tmp.path().join(p);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    };
    write("b.cpp");
    write("a.c");
    write("sub/deep.S");
    write("skip.h");
    write(".hidden.c");

    let sources = gather_source_files(tmp.path()).unwrap();
    let names: Vec<_> = sources
        .iter()
        .map(|p| p.strip_prefix(tmp.path()).unwrap().display().to_string())
        .collect();
    assert_eq!(names, vec!["a.c", "b.cpp", "sub/deep.S"]);
}

#[rstest]
fn test_parse_dep_file() {
    let text = "build/core/wiring.c.o: \\\n /core/wiring.c \\\n /core/Arduino.h\n";
    assert_eq!(
        parse_dep_file(text),
        vec!["/core/wiring.c".to_string(), "/core/Arduino.h".to_string()]
    );
}

#[rstest]
fn test_parse_dep_file_escaped_spaces() {
    let text = "obj.o: /some\\ dir/a.h /plain/b.h\n";
    assert_eq!(
        parse_dep_file(text),
        vec!["/some dir/a.h".to_string(), "/plain/b.h".to_string()]
    );
}

#[rstest]
fn test_parse_dep_file_without_colon() {
    assert!(parse_dep_file("garbage").is_empty());
}

fn set_mtime(path: &Path, seconds: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds))
        .unwrap();
}

#[rstest]
fn test_object_is_up_to_date() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("a.c");
    let object = tmp.path().join("a.c.o");
    let dep = tmp.path().join("a.c.d");
    let header = tmp.path().join("a.h");
    std::fs::write(&source, "").unwrap();
    std::fs::write(&object, "").unwrap();
    std::fs::write(&header, "").unwrap();
    std::fs::write(
        &dep,
        format!("{}: {} {}\n", object.display(), source.display(), header.display()),
    )
    .unwrap();

    set_mtime(&source, 1000);
    set_mtime(&header, 1000);
    set_mtime(&object, 2000);
    assert!(object_is_up_to_date(&source, &object).unwrap());

    // A newer source invalidates the object
    set_mtime(&source, 3000);
    assert!(!object_is_up_to_date(&source, &object).unwrap());

    // A newer recorded dependency invalidates it too
    set_mtime(&source, 1000);
    set_mtime(&header, 3000);
    assert!(!object_is_up_to_date(&source, &object).unwrap());
}

#[rstest]
fn test_object_without_dep_file_is_stale() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("a.c");
    let object = tmp.path().join("a.c.o");
    std::fs::write(&source, "").unwrap();
    std::fs::write(&object, "").unwrap();
    set_mtime(&source, 1000);
    set_mtime(&object, 2000);

    assert!(!object_is_up_to_date(&source, &object).unwrap());
}
