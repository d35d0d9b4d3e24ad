// tests/directory_integration.rs

//! Directory containers, sequential and parallel.

mod common;

use common::*;
use nsrewrite::{AppliedChanges, TransformOptions, report};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn populate(root: &Path) {
    let write = |rel: &str, data: &[u8]| {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    };
    write("javax/servlet/MyFilter.class", &servlet_filter_class());
    write("javax/servlet/Foo.java", b"package javax.servlet;\n");
    write(
        "lib/web.jar",
        &zip_bytes(&[("javax/servlet/MyFilter.class", &servlet_filter_class())]),
    );
    write("notes/readme.txt", b"unchanged");
    fs::create_dir_all(root.join("empty")).unwrap();
}

fn run(parallel: bool) -> (TempDir, AppliedChanges) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    populate(&input);

    let changes = transformer(TransformOptions {
        parallel,
        ..TransformOptions::default()
    })
    .apply("in", &input, &output)
    .unwrap();
    (dir, changes)
}

#[test]
fn test_directory_is_mirrored() {
    let (dir, changes) = run(false);
    let out = dir.path().join("out");
    let root = changes.as_container().unwrap();

    assert_eq!(root.immediate["Class"].renamed, 1);
    assert_eq!(root.immediate["Class"].content_changed, 1);
    assert_eq!(root.immediate["Plain"].renamed, 1);
    assert_eq!(root.immediate["Jar"].changed, 1);
    assert_eq!(root.immediate["PassThrough"].unchanged, 1);
    assert_eq!(root.nested["Class"].renamed, 1);

    assert!(out.join("empty").is_dir());
    assert_eq!(fs::read(out.join("notes/readme.txt")).unwrap(), b"unchanged");
    assert_eq!(
        fs::read_to_string(out.join("jakarta/servlet/Foo.java")).unwrap(),
        "package jakarta.servlet;\n"
    );
    assert!(out.join("jakarta/servlet/MyFilter.class").is_file());
    assert!(!out.join("javax/servlet/Foo.java").exists());

    let jar = fs::read(out.join("lib/web.jar")).unwrap();
    assert_eq!(zip_entries(&jar)[0].0, "jakarta/servlet/MyFilter.class");
}

#[test]
fn test_parallel_matches_sequential() {
    let (_a, sequential) = run(false);
    let (_b, parallel) = run(true);
    assert_eq!(sequential, parallel);
    assert_eq!(report::render_text(&sequential), report::render_text(&parallel));
}

#[test]
fn test_colliding_outputs_are_duplicated() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    fs::create_dir_all(input.join("javax/servlet")).unwrap();
    fs::create_dir_all(input.join("jakarta/servlet")).unwrap();
    fs::write(input.join("jakarta/servlet/Foo.java"), b"package jakarta.servlet;\n").unwrap();
    fs::write(input.join("javax/servlet/Foo.java"), b"package javax.servlet;\n").unwrap();

    let changes = transformer(TransformOptions::default())
        .apply("in", &input, &output)
        .unwrap();
    let tally = changes.as_container().unwrap().immediate["Plain"];
    // jakarta/ sorts first and is written; the relocated javax/ copy collides
    assert_eq!(tally.duplicated, 1);
    assert_eq!(
        fs::read_to_string(output.join("jakarta/servlet/Foo.java")).unwrap(),
        "package jakarta.servlet;\n"
    );
}

#[test]
fn test_json_report_for_directory() {
    let (_dir, changes) = run(false);
    let json = report::render_json(&changes).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["kind"], "container");
    assert_eq!(value["changes"]["input_name"], "in");
    assert_eq!(value["immediate"]["Jar"]["changed"], 1);
}
