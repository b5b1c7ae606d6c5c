use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const WORDS: &str = "the\ncat\nsat\non\nmat\nand\nsay\nword\nis\nfine\n";

fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("words.txt"), WORDS).unwrap();
    fs::create_dir(dir.path().join("custom")).unwrap();
    dir
}

fn inkcheck(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("inkcheck").unwrap();
    cmd.current_dir(dir)
        .env("INKCHECK_USER", "tester")
        .env_remove("RUST_LOG")
        .args(["--no-color", "--dictionary", "words.txt", "--custom-dir", "custom"]);
    cmd
}

#[test]
fn test_clean_file_passes() {
    let dir = workspace();
    fs::write(dir.path().join("doc.md"), "The cat sat on the mat.\n").unwrap();

    inkcheck(dir.path())
        .arg("doc.md")
        .assert()
        .success()
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_misspelling_fails_with_location() {
    let dir = workspace();
    fs::write(dir.path().join("doc.md"), "The cat\nsat on teh mat.\n").unwrap();

    inkcheck(dir.path())
        .arg("doc.md")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2:8"))
        .stdout(predicate::str::contains("Unknown word: teh"))
        .stdout(predicate::str::contains("the"));

    inkcheck(dir.path())
        .args(["doc.md", "--no-fail"])
        .assert()
        .success();
}

#[test]
fn test_code_is_not_checked() {
    let dir = workspace();
    fs::write(
        dir.path().join("doc.md"),
        "The cat sat.\n\n```rust\nfn zzqx() {}\n```\n\nSay `qqq` and fine.\n",
    )
    .unwrap();

    inkcheck(dir.path()).arg("doc.md").assert().success();
}

#[test]
fn test_json_output() {
    let dir = workspace();
    fs::write(dir.path().join("doc.md"), "The the cat sat on teh mat.\n").unwrap();

    let output = inkcheck(dir.path())
        .args(["doc.md", "-o", "json", "--no-fail"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["files_checked"], 1);
    assert_eq!(report["total_errors"], 1);
    let codes: Vec<_> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["code"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes, vec!["repeated-words", "spelling"]);
}

#[test]
fn test_fix_rewrites_file() {
    let dir = workspace();
    let doc = dir.path().join("doc.md");
    fs::write(&doc, "The the cat sat on teh mat.\nSay a word.\n").unwrap();

    inkcheck(dir.path())
        .args(["doc.md", "--fix"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 corrections applied"));

    assert_eq!(
        fs::read_to_string(&doc).unwrap(),
        "The cat sat on the mat.\nSay a word.\n"
    );
}

#[test]
fn test_dict_add_suppresses_word() {
    let dir = workspace();
    fs::write(dir.path().join("doc.md"), "The tokio cat.\n").unwrap();

    inkcheck(dir.path()).arg("doc.md").assert().code(1);

    inkcheck(dir.path())
        .args(["dict", "add", "tokio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));

    inkcheck(dir.path()).arg("doc.md").assert().success();
}

#[test]
fn test_directories_are_walked() {
    let dir = workspace();
    fs::create_dir(dir.path().join("notes")).unwrap();
    fs::write(dir.path().join("notes/a.md"), "The cat.\n").unwrap();
    fs::write(dir.path().join("notes/b.txt"), "teh cat.\n").unwrap();
    fs::write(dir.path().join("notes/skip.rs"), "fn zzqx() {}\n").unwrap();

    inkcheck(dir.path())
        .arg("notes")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("b.txt"))
        .stdout(predicate::str::contains("in 2 files"));
}

#[test]
fn test_completion_script() {
    Command::cargo_bin("inkcheck")
        .unwrap()
        .args(["--completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("inkcheck"));
}
