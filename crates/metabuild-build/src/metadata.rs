//! Metadata file loading
//!
//! A metadata file is a plain-text build description. The first line is a
//! free-form header and is ignored. Every following non-blank line is a
//! `key:value` pair; list-typed keys take a bracketed, comma-separated value:
//!
//! ```text
//! # project metadata
//! compiler:g++
//! sourceDir:src/
//! buildDir:build/
//! objectsDir:objects/
//! exe:solver.x
//! files:[main.cpp, solver.cpp]
//! compileFlags:[O3, Wall]
//! libs:[armadillo]
//! headerSearchDirs:[]
//! ```
//!
//! Loading is all-or-nothing: the first offending line aborts the load.

use crate::error::{BuildError, BuildResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Conventional metadata file name, looked up in the working directory
pub const DEFAULT_METADATA_FILE: &str = "meta.dat";

/// Keys whose values are bracketed lists
pub const LIST_KEYS: [&str; 6] = [
    "files",
    "compileFlags",
    "linkFlags",
    "libLocations",
    "libs",
    "headerSearchDirs",
];

/// A single metadata value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Scalar(String),
    List(Vec<String>),
}

impl MetaValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            Self::Scalar(_) => None,
        }
    }
}

/// Parsed metadata: key to scalar or list, sorted by key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Where the metadata came from (used in diagnostics)
    #[serde(skip)]
    origin: PathBuf,
    entries: BTreeMap<String, MetaValue>,
}

impl Metadata {
    /// Load and parse a metadata file
    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(BuildError::MetadataNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = fs::read_to_string(path).map_err(|error| BuildError::MetadataRead {
            path: path.to_path_buf(),
            error,
        })?;

        Self::parse(&text, path)
    }

    /// Parse metadata text. `origin` is only used for error reporting.
    pub fn parse(text: &str, origin: impl Into<PathBuf>) -> BuildResult<Self> {
        let origin = origin.into();
        let mut entries = BTreeMap::new();

        // Line 1 is a header
        for (index, raw) in text.lines().enumerate().skip(1) {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let line_no = index + 1;
            let (key, value) = split_pair(line)
                .ok_or_else(|| BuildError::malformed(&origin, line_no, separator_reason(line)))?;

            if key.is_empty() {
                return Err(BuildError::malformed(&origin, line_no, "empty key"));
            }

            let value = if is_list_key(key) {
                MetaValue::List(
                    parse_list(value)
                        .map_err(|reason| BuildError::malformed(&origin, line_no, reason))?,
                )
            } else {
                MetaValue::Scalar(value.to_string())
            };

            entries.insert(key.to_string(), value);
        }

        Ok(Self { origin, entries })
    }

    /// File the metadata was read from
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    /// Scalar value of `key`, if present and scalar
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_scalar)
    }

    /// List value of `key`, if present and a list
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(MetaValue::as_list)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `key` takes a bracketed list value
pub fn is_list_key(key: &str) -> bool {
    LIST_KEYS.contains(&key)
}

/// Split `key:value`, requiring exactly one separator
fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if value.contains(':') {
        return None;
    }
    Some((key.trim(), value.trim()))
}

fn separator_reason(line: &str) -> String {
    let count = line.matches(':').count();
    format!(
        "expected exactly one ':' separator, found {} in '{}'",
        count, line
    )
}

/// Parse `[a, b, c]` into its trimmed elements
fn parse_list(value: &str) -> Result<Vec<String>, String> {
    let inner = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("expected a bracketed list, found '{}'", value))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<String> = inner.split(',').map(|item| item.trim().to_string()).collect();

    if items.iter().any(String::is_empty) {
        return Err(format!("empty element in list '{}'", value));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> BuildResult<Metadata> {
        Metadata::parse(text, "meta.dat")
    }

    #[test]
    fn test_header_line_is_skipped() {
        // The header would be malformed if it were parsed
        let meta = parse("a:b:c header\nexe:app\n").unwrap();
        assert_eq!(meta.len(), 1);
        assert_eq!(meta.scalar("exe"), Some("app"));
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let meta = parse("header\n\nexe:app\n   \ncompiler:g++\n").unwrap();
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn test_list_elements_are_trimmed() {
        let meta = parse("header\nfiles:[ a.cpp ,b.cpp,  c.cpp]\n").unwrap();
        assert_eq!(
            meta.list("files").unwrap(),
            ["a.cpp", "b.cpp", "c.cpp"].map(String::from)
        );
    }

    #[test]
    fn test_empty_brackets_parse_to_empty_list() {
        let meta = parse("header\nheaderSearchDirs:[]\nlibs:[  ]\n").unwrap();
        assert_eq!(meta.list("headerSearchDirs"), Some(&[][..]));
        assert_eq!(meta.list("libs"), Some(&[][..]));
    }

    #[test]
    fn test_unknown_key_is_scalar() {
        let meta = parse("header\nauthor:someone\nnotes:[x, y]\n").unwrap();
        assert_eq!(meta.scalar("author"), Some("someone"));
        assert_eq!(meta.scalar("notes"), Some("[x, y]"));
    }

    #[test]
    fn test_two_separators_rejected() {
        let err = parse("header\nexe:app\ncompiler:c++:extra\n").unwrap_err();
        match err {
            BuildError::MalformedMetadata { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_separator_rejected() {
        let err = parse("header\nexe app\n").unwrap_err();
        assert!(matches!(err, BuildError::MalformedMetadata { line: 2, .. }));
    }

    #[test]
    fn test_unbracketed_list_rejected() {
        let err = parse("header\nfiles:main.cpp\n").unwrap_err();
        assert!(matches!(err, BuildError::MalformedMetadata { line: 2, .. }));
    }

    #[test]
    fn test_empty_list_element_rejected() {
        let err = parse("header\nlibs:[m,,armadillo]\n").unwrap_err();
        assert!(matches!(err, BuildError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_later_key_wins() {
        let meta = parse("header\nexe:first\nexe:second\n").unwrap();
        assert_eq!(meta.scalar("exe"), Some("second"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Metadata::load(dir.path().join(DEFAULT_METADATA_FILE)).unwrap_err();
        assert!(matches!(err, BuildError::MetadataNotFound { .. }));
    }
}
