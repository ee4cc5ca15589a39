//! Tests for the kbdump binary. None of them touch the network.

mod common;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{fixture_path, gzip, load_fixture, JSON_FIXTURE, XML_FIXTURE};

fn kbdump() -> Command {
    let mut cmd = Command::cargo_bin("kbdump").unwrap();
    for var in [
        "KBDUMP_PROJECT",
        "KBDUMP_OFFLINE",
        "KBDUMP_DUMP_DIR",
        "KBDUMP_ARCHIVE_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_process_json_file() {
    kbdump()
        .args(["process", "--offline", "--file"])
        .arg(fixture_path(JSON_FIXTURE))
        .assert()
        .success()
        .stdout(predicate::str::contains("json dump 20210301"))
        .stdout(predicate::str::contains("Records: 3"))
        .stdout(predicate::str::contains("Entities: 3"));
}

#[test]
fn test_process_xml_file_with_site_filter() {
    kbdump()
        .args(["process", "--offline", "--type", "full", "--project", "enwiki"])
        .args(["--site", "dewiki", "--file"])
        .arg(fixture_path(XML_FIXTURE))
        .assert()
        .success()
        .stdout(predicate::str::contains("Records: 3"))
        .stdout(predicate::str::contains("Counted: 0"));
}

#[test]
fn test_process_discovers_local_dump() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("wikidata-20210301-all.json.gz"),
        gzip(load_fixture(JSON_FIXTURE).as_bytes()),
    )
    .unwrap();

    kbdump()
        .args(["process", "--offline", "--dump-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities: 3"));
}

#[test]
fn test_process_offline_without_dumps_fails() {
    let dir = tempfile::tempdir().unwrap();

    kbdump()
        .args(["process", "--offline", "--dump-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No json dump available for wikidatawiki"));
}

#[test]
fn test_process_corrupt_file_with_skip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wikidata-20210301-all.json");
    fs::write(&path, "[\n{\"id\":\"Q1\"},\n{broken,\n{\"id\":\"Q3\"}\n]\n").unwrap();

    kbdump()
        .args(["process", "--offline", "--file"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt dump"));

    kbdump()
        .args(["process", "--offline", "--skip-corrupt", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Records: 2"))
        .stdout(predicate::str::contains("Corrupt records skipped: 1"));
}

#[test]
fn test_list_offline_shows_local_dumps() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("wikidata-20210101-all.json.gz"), b"").unwrap();
    fs::write(dir.path().join("wikidata-20210301-all.json.gz"), b"").unwrap();

    kbdump()
        .args(["list", "--offline", "--dump-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("20210301"))
        .stdout(predicate::str::contains("20210101"))
        .stdout(predicate::str::contains("local"));
}

#[test]
fn test_invalid_project_is_rejected() {
    kbdump()
        .args(["list", "--offline", "--project", "Not a wiki"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid project name"));
}

#[test]
fn test_download_requires_existing_directory() {
    kbdump()
        .args(["download", "--offline", "--output", "/nonexistent/kbdump/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Output directory does not exist"));
}
