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

fn tagseek(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tagseek"));
    cmd.current_dir(dir.path()).env("HOME", dir.path());
    cmd
}

fn json_records(cmd: &mut Command) -> Vec<Value> {
    let assert = cmd.assert().success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    serde_json::from_str(&out).expect("json")
}

fn sample_tags() -> String {
    format!(
        "{HEADER}Parser\tsrc/parse.c\t/^struct Parser {{$/;\"\ts\n\
         main\tsrc/main.c\t/^int main(void)$/;\"\tf\tline:3\n\
         main\ttools/gen.c\t10;\"\tf\n\
         mainloop\tsrc/loop.c\t/^void mainloop(void)$/;\"\tkind:function\n\
         parse\tsrc/parse.c\t/^int parse(struct Parser *p)$/;\"\tf\n"
    )
}

#[test]
fn lookup_lists_exact_records() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());

    let results = json_records(tagseek(&dir).args(["--format", "json", "--compact", "lookup", "main"]));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file"], "src/main.c");
    assert_eq!(results[0]["kind"], "function");
    assert_eq!(results[0]["line"], 3);
    assert_eq!(results[1]["file"], "tools/gen.c");
    assert_eq!(results[1]["ex_cmd"], "10");
}

#[test]
fn lookup_prefix_and_max() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "-p", "main"]));
    assert_eq!(results.len(), 3);
    assert_eq!(results[2]["tag"], "mainloop");

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "-p", "main", "-m", "1"]));
    assert_eq!(results.len(), 1);
}

#[test]
fn lookup_finds_tags_file_in_parent_directory() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());
    let nested = dir.path().join("src").join("deep");
    fs::create_dir_all(&nested).expect("mkdir");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tagseek"));
    let assert = cmd
        .current_dir(&nested)
        .env("HOME", dir.path())
        .args(["--format", "json", "lookup", "parse"])
        .assert()
        .success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let results: Vec<Value> = serde_json::from_str(&out).expect("json");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["kind"], "function");
}

#[test]
fn lookup_reports_missing_tag_in_text_mode() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());

    tagseek(&dir)
        .args(["lookup", "nothing_here"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tags found for"));

    tagseek(&dir)
        .args(["lookup", "parse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/parse.c"));
}

#[test]
fn lookup_without_tags_file_suggests_ctags() {
    let dir = TempDir::new().expect("tempdir");
    tagseek(&dir)
        .args(["lookup", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ctags -R"));
}

#[test]
fn lookup_rejects_unsorted_file() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir.path().join("tags"),
        "!_TAG_FILE_SORTED\t0\t/0=unsorted, 1=sorted, 2=foldcase/\nzeta\tz.c\t1;\"\tf\nalpha\ta.c\t1;\"\tf\n",
    );
    tagseek(&dir)
        .args(["lookup", "alpha"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsorted"));
}

#[test]
fn lookup_honours_config_file() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("TAGS.ctags"), &sample_tags());
    write_file(
        &dir.path().join(".tagseekrc.toml"),
        "tags_file = \"TAGS.ctags\"\ndefault_format = \"json\"\nprefix_match = true\nuse_mmap = false\n",
    );

    let results = json_records(tagseek(&dir).args(["lookup", "main"]));
    assert_eq!(results.len(), 3);
}

#[test]
fn lookup_in_foldcase_file_ignores_case() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir.path().join("tags"),
        "!_TAG_FILE_SORTED\t2\t/0=unsorted, 1=sorted, 2=foldcase/\n\
         alpha\ta.c\t1;\"\tf\n\
         Widget\tw.h\t3;\"\tc\n\
         widget\tw.c\t9;\"\tf\n\
         zeta\tz.c\t1;\"\tf\n",
    );

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "WIDGET"]));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["kind"], "class");
}

#[test]
fn lookup_no_prefix_overrides_config() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());
    write_file(&dir.path().join(".tagseekrc.toml"), "prefix_match = true\n");

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "main"]));
    assert_eq!(results.len(), 3);
    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "main", "--no-prefix"]));
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["tag"] == "main"));
}

#[test]
fn lookup_word_retries_with_file_extension() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir.path().join("tags"),
        &format!("{HEADER}main.c\tsrc/main.c\t1;\"\tF\nparse\tsrc/parse.c\t4;\"\tf\n"),
    );

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "-w", "main.c\" is included"]));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["tag"], "main.c");
    assert_eq!(results[0]["kind"], "file");

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "-w", "parse(p);"]));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["tag"], "parse");

    // Without -w the text is taken as the whole tag
    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "main"]));
    assert!(results.is_empty());
}

#[test]
fn lookup_falls_back_to_global_tags() {
    let dir = TempDir::new().expect("tempdir");
    write_file(&dir.path().join("tags"), &sample_tags());
    let global = dir.path().join("global").join("tags");
    write_file(
        &global,
        &format!("{HEADER}main\tlibc/start.c\t7;\"\tf\nprintf\t/usr/include/stdio.h\t/^extern int printf$/;\"\tp\n"),
    );
    write_file(
        &dir.path().join(".tagseekrc.toml"),
        &format!("global_tags_file = \"{}\"\n", global.display()),
    );

    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "printf"]));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["file"], "/usr/include/stdio.h");

    // Local matches win over the global file
    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "main"]));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file"], "src/main.c");
}

#[test]
fn lookup_global_tags_from_command_line() {
    let dir = TempDir::new().expect("tempdir");
    write_file(
        &dir.path().join("global").join("tags"),
        &format!("{HEADER}printf\t/usr/include/stdio.h\t/^extern int printf$/;\"\tp\n"),
    );

    // No local tags file: the global one is searched directly
    let results = json_records(
        tagseek(&dir).args(["--format", "json", "--global-tags", "global/tags", "lookup", "printf"]),
    );
    assert_eq!(results.len(), 1);

    write_file(&dir.path().join("tags"), &sample_tags());
    let results = json_records(
        tagseek(&dir).args(["--format", "json", "lookup", "printf", "--global-tags", "global/tags"]),
    );
    assert_eq!(results.len(), 1);
    let results = json_records(tagseek(&dir).args(["--format", "json", "lookup", "printf"]));
    assert!(results.is_empty());
}
