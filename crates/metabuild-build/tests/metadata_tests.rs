//! Metadata loading tests against files on disk

use metabuild_build::{BuildError, MetaValue, Metadata, ProjectConfig, DEFAULT_METADATA_FILE};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_meta(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join(DEFAULT_METADATA_FILE);
    fs::write(&path, content).unwrap();
    path
}

const FULL: &str = "\
Project 5 metadata
compiler:g++
sourceDir:src/
buildDir:build/
objectsDir:objects/
exe:solarsystem.x
files:[main.cpp, CelestialBody.cpp, SolarSystem.cpp]
compileFlags:[O3, std=c++11]
linkFlags:[]
libLocations:[/usr/local/lib]
libs:[armadillo, lapack, blas]
headerSearchDirs:[]
";

#[test]
fn test_load_full_metadata_file() {
    let dir = TempDir::new().unwrap();
    let path = write_meta(&dir, FULL);

    let config = ProjectConfig::load(&path).unwrap();

    assert_eq!(config.root, dir.path());
    assert_eq!(config.compiler, "g++");
    assert_eq!(config.exe, "solarsystem.x");
    assert_eq!(
        config.files,
        vec!["main.cpp", "CelestialBody.cpp", "SolarSystem.cpp"]
    );
    assert_eq!(config.compile_flags, vec!["O3", "std=c++11"]);
    assert!(config.link_flags.is_empty());
    assert_eq!(config.lib_locations, vec!["/usr/local/lib"]);
    assert_eq!(config.libs, vec!["armadillo", "lapack", "blas"]);
    assert!(config.header_search_dirs.is_empty());
    assert_eq!(config.units().len(), 3);
}

#[test]
fn test_empty_header_dirs_are_empty_not_blank() {
    let dir = TempDir::new().unwrap();
    let metadata = Metadata::load(write_meta(&dir, FULL)).unwrap();

    assert_eq!(
        metadata.get("headerSearchDirs"),
        Some(&MetaValue::List(Vec::new()))
    );
}

#[rstest]
#[case::two_separators("compiler:g++:7")]
#[case::no_separator("compiler g++")]
#[case::url_like("compiler:http://example.com")]
#[case::bare_list("files:main.cpp, a.cpp")]
#[case::half_bracket("libs:[armadillo")]
fn test_malformed_line_aborts_load(#[case] bad_line: &str) {
    let dir = TempDir::new().unwrap();
    let content = format!("{}{}\n", FULL, bad_line);
    let path = write_meta(&dir, &content);

    match Metadata::load(&path).unwrap_err() {
        BuildError::MalformedMetadata { path: at, line, .. } => {
            assert_eq!(at, path);
            assert_eq!(line, FULL.lines().count() + 1);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[rstest]
#[case::missing_exe("exe:solarsystem.x\n")]
#[case::missing_source_dir("sourceDir:src/\n")]
#[case::missing_files("files:[main.cpp, CelestialBody.cpp, SolarSystem.cpp]\n")]
fn test_missing_required_key(#[case] removed: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_meta(&dir, &FULL.replace(removed, ""));

    let err = ProjectConfig::load(&path).unwrap_err();
    assert!(matches!(err, BuildError::InvalidMetadata { .. }), "{err:?}");
}

#[test]
fn test_bracketed_value_on_scalar_key_is_kept_verbatim() {
    let dir = TempDir::new().unwrap();
    let path = write_meta(&dir, &FULL.replace("compiler:g++", "compiler:[g++]"));

    let config = ProjectConfig::load(&path).unwrap();
    assert_eq!(config.compiler, "[g++]");
}

#[test]
fn test_files_with_same_object_name_are_invalid() {
    let dir = TempDir::new().unwrap();
    let text = FULL.replace(
        "files:[main.cpp, CelestialBody.cpp, SolarSystem.cpp]",
        "files:[main.cpp, tools/main.cpp]",
    );
    let err = ProjectConfig::load(write_meta(&dir, &text)).unwrap_err();
    assert!(matches!(err, BuildError::InvalidMetadata { .. }), "{err:?}");
}

#[test]
fn test_header_only_file_is_empty_metadata() {
    let dir = TempDir::new().unwrap();
    let metadata = Metadata::load(write_meta(&dir, "just a header\n")).unwrap();
    assert!(metadata.is_empty());
}

#[test]
fn test_missing_metadata_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DEFAULT_METADATA_FILE);

    let err = ProjectConfig::load(&path).unwrap_err();
    assert!(err.is_metadata_error());
    assert_eq!(
        err.to_string(),
        format!("No metadata file found at {}", path.display())
    );
}
