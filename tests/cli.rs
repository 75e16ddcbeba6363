use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn scrollshot_cmd() -> Command {
    Command::cargo_bin("scrollshot").expect("binary exists")
}

#[test]
fn help_prints_about_text() {
    scrollshot_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Tiled capture engine for oversized scrollable surfaces",
        ));
}

#[test]
fn no_flags_prints_usage() {
    scrollshot_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn conflicting_modes_are_rejected() {
    scrollshot_cmd()
        .args(["--full", "--visible"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mutually exclusive"));
}

#[test]
fn malformed_region_is_rejected() {
    scrollshot_cmd()
        .args(["--region", "10,20,300"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected X,Y,WIDTH,HEIGHT"));
}

#[test]
fn full_capture_saves_a_png() {
    let config_home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();

    scrollshot_cmd()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["--full", "--fast", "--viewport", "640x480"])
        .arg("--save-dir")
        .arg(save_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved to"));

    let entries: Vec<_> = std::fs::read_dir(save_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("fullpage-"));
    assert!(entries[0].ends_with(".png"));

    let saved = image::open(save_dir.path().join(&entries[0])).unwrap();
    assert_eq!((saved.width(), saved.height()), (1280, 3200));
}

#[test]
fn region_capture_saves_a_png() {
    let config_home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();

    scrollshot_cmd()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["--region", "10,20,300,200", "--fast"])
        .arg("--save-dir")
        .arg(save_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved to"));

    let entries: Vec<_> = std::fs::read_dir(save_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("region-"));

    let saved = image::open(save_dir.path().join(&entries[0])).unwrap();
    assert_eq!((saved.width(), saved.height()), (300, 200));
}

#[test]
fn rate_limited_capture_still_saves() {
    let config_home = TempDir::new().unwrap();
    let save_dir = TempDir::new().unwrap();

    scrollshot_cmd()
        .env("XDG_CONFIG_HOME", config_home.path())
        .args(["--full", "--fast", "--rate-limit", "2"])
        .arg("--save-dir")
        .arg(save_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved to"));
}

#[test]
fn init_config_writes_default_file_once() {
    let config_home = TempDir::new().unwrap();

    scrollshot_cmd()
        .env("XDG_CONFIG_HOME", config_home.path())
        .arg("--init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default config"));

    let written = config_home.path().join("scrollshot").join("config.toml");
    let contents = std::fs::read_to_string(&written).unwrap();
    assert!(contents.contains("[capture]"));
    assert!(contents.contains("[delivery]"));

    scrollshot_cmd()
        .env("XDG_CONFIG_HOME", config_home.path())
        .arg("--init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
