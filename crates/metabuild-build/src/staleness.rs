//! Per-unit staleness detection
//!
//! A unit is stale when its object file is missing, or when the source or a
//! same-basename header (`name.h`, `name.hpp`) was modified strictly after the
//! object. Includes are not followed: a change to any other header goes
//! unnoticed until one of the files above changes too.

use crate::project::CompilationUnit;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Why a unit needs compiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "path", rename_all = "kebab-case")]
pub enum StaleReason {
    /// No object file yet
    MissingObject,
    /// Source newer than the object
    SourceModified,
    /// Header newer than the object
    HeaderModified(PathBuf),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingObject => write!(f, "no object file"),
            Self::SourceModified => write!(f, "source modified"),
            Self::HeaderModified(path) => write!(f, "header {} modified", path.display()),
        }
    }
}

/// Staleness decision for one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Staleness {
    UpToDate,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            Self::Stale(reason) => Some(reason),
            Self::UpToDate => None,
        }
    }
}

/// Decides which units need a fresh compile. Never modifies the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StalenessAnalyzer;

impl StalenessAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `unit` must be recompiled
    pub fn analyze(&self, unit: &CompilationUnit) -> Staleness {
        let Some(object_time) = modified(&unit.object_path) else {
            return Staleness::Stale(StaleReason::MissingObject);
        };

        if newer_than(&unit.source_path, object_time) {
            return Staleness::Stale(StaleReason::SourceModified);
        }

        unit.candidate_headers
            .iter()
            .find(|header| newer_than(header, object_time))
            .map(|header| Staleness::Stale(StaleReason::HeaderModified(header.clone())))
            .unwrap_or(Staleness::UpToDate)
    }

    /// Analyze every unit, keeping the input order
    pub fn analyze_all<'a>(
        &self,
        units: &'a [CompilationUnit],
    ) -> Vec<(&'a CompilationUnit, Staleness)> {
        units.iter().map(|unit| (unit, self.analyze(unit))).collect()
    }
}

/// Modification time, or `None` if the file is absent or unreadable
fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `path` exists and was modified strictly after `reference`
fn newer_than(path: &Path, reference: SystemTime) -> bool {
    modified(path).is_some_and(|time| time > reference)
}
