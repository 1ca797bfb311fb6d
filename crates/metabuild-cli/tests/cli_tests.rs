//! CLI integration tests
//!
//! Tests the `metabuild` binary end to end: help output, error exits and
//! builds driven by a fake compiler script. Tests run serially so no child
//! process can hold the freshly written compiler script open.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn metabuild_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("metabuild").unwrap();
    cmd.current_dir(dir)
        .env_remove("METABUILD_META")
        .env_remove("METABUILD_JOBS")
        .env_remove("METABUILD_ALWAYS_CLEAN")
        .env_remove("METABUILD_JSON")
        .env("NO_COLOR", "1");
    cmd
}

// ══════════════════════════════════════════════════════════════════════════════
// HELP AND ERROR EXITS
// ══════════════════════════════════════════════════════════════════════════════

#[test]
#[serial]
fn test_help_lists_commands_and_examples() {
    let dir = TempDir::new().unwrap();
    metabuild_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("EXAMPLES"))
        .stdout(predicate::str::contains("METABUILD_META"));
}

#[test]
#[serial]
fn test_missing_metadata_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    metabuild_cmd(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No metadata file found"));
}

#[test]
#[serial]
fn test_malformed_metadata_exits_nonzero_without_side_effects() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("meta.dat"),
        "header\nsourceDir:src/\nbuildDir:build/\nobjectsDir:obj/\nexe:a:out\nfiles:[a.cpp]\n",
    )
    .unwrap();

    metabuild_cmd(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed metadata"))
        .stderr(predicate::str::contains("line 5"));

    assert!(!dir.path().join("build").exists());
}

#[test]
#[serial]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    metabuild_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("metabuild"));
}

// ══════════════════════════════════════════════════════════════════════════════
// BUILDS WITH A FAKE COMPILER
// ══════════════════════════════════════════════════════════════════════════════

#[cfg(unix)]
mod builds {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const FAKE_COMPILER: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  [ "$prev" = "-o" ] && out="$arg"
  prev="$arg"
done
echo "$*" > "$out"
"#;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let compiler = dir.path().join("fakecc");
        fs::write(&compiler, FAKE_COMPILER).unwrap();
        fs::set_permissions(&compiler, fs::Permissions::from_mode(0o755)).unwrap();

        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.cpp"), "int main() {}\n").unwrap();
        fs::write(dir.path().join("src/vec.cpp"), "// vec\n").unwrap();
        fs::write(
            dir.path().join("meta.dat"),
            format!(
                "metadata\ncompiler:{}\nsourceDir:src/\nbuildDir:build/\nobjectsDir:objects/\nexe:app.x\nfiles:[main.cpp, vec.cpp]\ncompileFlags:[O2]\nlibs:[m]\n",
                compiler.display()
            ),
        )
        .unwrap();
        dir
    }

    #[test]
    #[serial]
    fn test_build_then_rebuild() {
        let dir = project();

        metabuild_cmd(dir.path())
            .arg("build")
            .assert()
            .success()
            .stdout(predicate::str::contains("$ "))
            .stdout(predicate::str::contains("-O2 -c src/main.cpp -o build/objects/main.o"))
            .stdout(predicate::str::contains("Successfully compiled"))
            .stdout(predicate::str::contains("2 compiled, 0 reused"));

        assert!(dir.path().join("build/objects/main.o").exists());
        assert!(dir.path().join("build/app.x").exists());

        metabuild_cmd(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("No changes, continuing."))
            .stdout(predicate::str::contains("0 compiled, 2 reused"));
    }

    #[test]
    #[serial]
    fn test_build_json_summary() {
        let dir = project();

        let output = metabuild_cmd(dir.path())
            .args(["build", "--json", "--jobs", "2"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(summary["success"], true);
        assert_eq!(summary["compiled_units"], 2);
        assert_eq!(summary["units"][1]["name"], "vec");
    }

    #[test]
    #[serial]
    fn test_always_clean_from_env() {
        let dir = project();

        metabuild_cmd(dir.path())
            .arg("build")
            .env("METABUILD_ALWAYS_CLEAN", "1")
            .assert()
            .success();

        assert!(dir.path().join("build/app.x").exists());
        assert!(!dir.path().join("build/objects/main.o").exists());
    }

    #[test]
    #[serial]
    fn test_always_clean_disabled_from_env() {
        let dir = project();

        metabuild_cmd(dir.path())
            .args(["build", "-q"])
            .env("METABUILD_ALWAYS_CLEAN", "0")
            .assert()
            .success();

        assert!(dir.path().join("build/objects/main.o").exists());
    }

    #[test]
    #[serial]
    fn test_json_from_env_for_plan() {
        let dir = project();

        let output = metabuild_cmd(dir.path())
            .arg("plan")
            .env("METABUILD_JSON", "yes")
            .output()
            .unwrap();
        assert!(output.status.success());

        let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(plan["units"][1]["name"], "vec");
    }

    #[test]
    #[serial]
    fn test_plan_does_not_build() {
        let dir = project();

        let output = metabuild_cmd(dir.path())
            .args(["plan", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(plan["units"][0]["stale"], true);
        assert_eq!(plan["units"][0]["reason"], "no object file");
        let expected_link = format!(
            "{} -o build/app.x build/objects/*.o -lm",
            dir.path().join("fakecc").display()
        );
        assert_eq!(plan["link"], expected_link.as_str());
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    #[serial]
    fn test_clean_after_build() {
        let dir = project();
        metabuild_cmd(dir.path()).arg("build").assert().success();

        metabuild_cmd(dir.path())
            .arg("clean")
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));

        assert!(!dir.path().join("build/app.x").exists());
        assert!(dir.path().join("src/main.cpp").exists());
    }
}
