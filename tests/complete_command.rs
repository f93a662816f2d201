// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const HEADER: &str = "!_TAG_FILE_FORMAT\t2\t/extended format/\n!_TAG_FILE_SORTED\t1\t/0=unsorted, 1=sorted, 2=foldcase/\n";

fn write_file(path: &std::path::Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

fn setup() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir.path().join("tags"),
        &format!(
            "{HEADER}main\tsrc/main.c\t3;\"\tf\n\
             main\ttools/gen.c\t10;\"\tf\n\
             main.c\tsrc/main.c\t1;\"\tF\n\
             mainloop\tsrc/loop.c\t5;\"\tf\n\
             parse\tsrc/parse.c\t4;\"\tf\n"
        ),
    );
    dir
}

fn complete(dir: &TempDir, args: &[&str]) -> Vec<String> {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tagseek"));
    let assert = cmd
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["--format", "json", "--compact", "complete"])
        .args(args)
        .assert()
        .success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let names: Vec<Value> = serde_json::from_str(&out).expect("json");
    names
        .iter()
        .map(|v| v.as_str().expect("name").to_string())
        .collect()
}

#[test]
fn complete_lists_each_name_once() {
    let dir = setup();
    assert_eq!(complete(&dir, &["mai"]), vec!["main", "main.c", "mainloop"]);
    assert_eq!(complete(&dir, &["mai", "-m", "2"]), vec!["main", "main.c"]);
    assert_eq!(complete(&dir, &["p"]), vec!["parse"]);
    assert!(complete(&dir, &["zzz"]).is_empty());
}

#[test]
fn complete_skips_header_lines() {
    let dir = setup();
    let names = complete(&dir, &[""]);
    assert_eq!(names.len(), 4);
    assert!(names.iter().all(|n| !n.starts_with('!')));
}

#[test]
fn complete_text_output() {
    let dir = setup();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tagseek"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["c", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mainloop"));

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tagseek"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["complete", "q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tags start with"));
}
