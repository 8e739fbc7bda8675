#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A `toki` invocation isolated from the user's config and data.
fn toki(data_dir: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("toki"));
    cmd.env_remove("TOKI_DATA_DIR")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(data_dir.join("no-such-config.toml"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

/// Last whitespace-separated token of the first line: the id renderers append.
fn trailing_id(text: &str) -> String {
    text.lines()
        .next()
        .and_then(|l| l.split_whitespace().last())
        .unwrap()
        .to_string()
}

#[test]
fn test_trip_lifecycle() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");

    toki(&data)
        .args(["trip", "new", "Japan 2025", "--start", "2025-04-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created trip Japan 2025"))
        .stdout(predicate::str::contains("(active)"));

    toki(&data)
        .args(["trip", "new", "Lisbon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(active)").not());

    toki(&data)
        .args(["trip", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* Japan 2025"))
        .stdout(predicate::str::contains("  Lisbon"));

    toki(&data)
        .args(["trip", "use", "Lisbon"])
        .assert()
        .success();
    toki(&data)
        .args(["trip", "rename", "Lisbon", "Porto"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed Lisbon to Porto"));
    toki(&data)
        .args(["trip", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* Porto"));

    toki(&data)
        .args(["trip", "delete", "Porto"])
        .assert()
        .success();
    toki(&data)
        .args(["trip", "show", "Porto"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Trip not found: Porto"));

    assert!(data.join("trips.json").is_file());
    assert!(data.join("prefs.json").is_file());
}

#[test]
fn test_cards_with_places_and_media() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let photo = temp.path().join("tower.jpg");
    fs::write(&photo, b"\xff\xd8\xff fake jpeg").unwrap();

    toki(&data).args(["trip", "new", "Japan"]).assert().success();

    let added = stdout_of(toki(&data).args([
        "place",
        "add",
        "35.6586",
        "139.7454",
        "--label",
        "Tokyo Tower",
    ]));
    assert!(added.contains("Added place Tokyo Tower [xn76g]"));
    let place_id = trailing_id(&added);

    toki(&data)
        .args(["place", "add", "35.65861", "139.74541"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found place Tokyo Tower"));

    let photo_card = stdout_of(
        toki(&data)
            .args(["card", "add", "photo", "--place", place_id.as_str(), "--media"])
            .arg(&photo),
    );
    let photo_card_id = trailing_id(&photo_card);
    toki(&data)
        .args([
            "card",
            "add",
            "note",
            "--place",
            place_id.as_str(),
            "--text",
            "Great view",
            "--tag",
            "view",
        ])
        .assert()
        .success();

    toki(&data)
        .args(["card", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@ Tokyo Tower"))
        .stdout(predicate::str::contains("Great view"))
        .stdout(predicate::str::contains("#view"));

    let media_files = || fs::read_dir(data.join("media")).unwrap().count();
    assert_eq!(media_files(), 1);

    toki(&data)
        .args(["card", "delete", photo_card_id.as_str()])
        .assert()
        .success();
    assert_eq!(media_files(), 0);

    toki(&data)
        .args(["card", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Great view"));
}

#[test]
fn test_card_needs_a_trip() {
    let temp = TempDir::new().unwrap();
    toki(temp.path())
        .args(["card", "add", "note", "--text", "orphan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No active trip"));
}

#[test]
fn test_unknown_place_is_rejected() {
    let temp = TempDir::new().unwrap();
    toki(temp.path()).args(["trip", "new", "T"]).assert().success();
    toki(temp.path())
        .args(["card", "add", "note", "--place", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Place not found: missing"));
}

#[test]
fn test_export_import_between_data_dirs() {
    let temp = TempDir::new().unwrap();
    let phone = temp.path().join("phone");
    let laptop = temp.path().join("laptop");
    let archive = temp.path().join("japan.tar.gz");
    let voice = temp.path().join("memo.m4a");
    fs::write(&voice, b"m4a bytes").unwrap();

    toki(&phone).args(["trip", "new", "Japan"]).assert().success();
    toki(&phone)
        .args(["card", "add", "audio", "--media"])
        .arg(&voice)
        .assert()
        .success();

    toki(&phone)
        .args(["export", "Japan", "-o"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported Japan (1 cards, 0 places, 1 media)"));

    toki(&laptop).args(["trip", "new", "Japan"]).assert().success();
    toki(&laptop)
        .arg("import")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported trip Japan 2 (1 cards)"));

    let installed: Vec<_> = fs::read_dir(laptop.join("media")).unwrap().collect();
    assert_eq!(installed.len(), 1);

    toki(&laptop)
        .args(["card", "list", "--trip", "Japan 2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("audio"));
}

#[test]
fn test_import_rejects_garbage() {
    let temp = TempDir::new().unwrap();
    let bogus = temp.path().join("bogus.tar.gz");
    fs::write(&bogus, b"definitely not gzip").unwrap();

    toki(&temp.path().join("data"))
        .arg("import")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not import"));
}

#[test]
fn test_doctor_on_clean_store() {
    let temp = TempDir::new().unwrap();
    toki(temp.path()).args(["trip", "new", "T"]).assert().success();
    toki(temp.path())
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("No problems found."));
}

#[test]
fn test_geohash_commands() {
    let temp = TempDir::new().unwrap();
    toki(temp.path())
        .args(["geohash", "encode", "57.64911", "10.40744", "-p", "11"])
        .assert()
        .success()
        .stdout("u4pruydqqvj\n");

    toki(temp.path())
        .args(["geohash", "encode", "-90", "-180", "--precision", "3"])
        .assert()
        .success()
        .stdout("000\n");

    toki(temp.path())
        .args(["geohash", "encode", "91", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Coordinates out of range"));

    toki(temp.path())
        .args(["geohash", "decode", "xn76g"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("35.661621 139.724121"));

    toki(temp.path())
        .args(["geohash", "decode", "xn7ag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("position 3"));
}

#[test]
fn test_data_dir_from_environment() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("env-data");

    Command::new(cargo_bin("toki"))
        .env("TOKI_DATA_DIR", &data)
        .arg("--config")
        .arg(temp.path().join("none.toml"))
        .args(["trip", "new", "From Env"])
        .assert()
        .success();

    assert!(data.join("trips.json").is_file());
}
