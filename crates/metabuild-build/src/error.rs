/// Build system error types
use crate::builder::BuildPhase;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No metadata file found at {path}")]
    MetadataNotFound { path: PathBuf },

    #[error("Failed to read metadata file {path}: {error}")]
    MetadataRead {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Malformed metadata in {path} at line {line}: {reason}")]
    MalformedMetadata {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Invalid metadata in {path}: {reason}")]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("Failed to prepare directory {path}: {error}")]
    DirectoryPreparation {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to remove {path}: {error}")]
    FileRemoval {
        path: PathBuf,
        error: std::io::Error,
        completed: Vec<String>,
    },

    #[error("Failed to start compiler for unit '{unit}': {error}")]
    CompileSpawn {
        unit: String,
        error: std::io::Error,
        completed: Vec<String>,
    },

    #[error("Compilation failed for unit '{unit}' ({})", exit_status(.exit_code))]
    CompileInvocation {
        unit: String,
        exit_code: Option<i32>,
        stderr: String,
        completed: Vec<String>,
    },

    #[error("Failed to start linker for '{exe}': {error}")]
    LinkSpawn {
        exe: PathBuf,
        error: std::io::Error,
        completed: Vec<String>,
    },

    #[error("Linking failed for '{exe}' ({})", exit_status(.exit_code))]
    LinkInvocation {
        exe: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
        completed: Vec<String>,
    },

    #[error("Build cancelled after {} compiled unit(s)", .completed.len())]
    Cancelled { completed: Vec<String> },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl BuildError {
    /// Create a malformed metadata error
    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl ToString) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            line,
            reason: reason.to_string(),
        }
    }

    /// Create an invalid metadata error
    pub fn invalid(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidMetadata {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a directory preparation error
    pub fn directory(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::DirectoryPreparation {
            path: path.into(),
            error,
        }
    }

    /// Create a file removal error, recording the units finished so far
    pub fn removal(path: impl Into<PathBuf>, error: std::io::Error, completed: &[String]) -> Self {
        Self::FileRemoval {
            path: path.into(),
            error,
            completed: completed.to_vec(),
        }
    }

    /// Units compiled successfully before this error occurred.
    ///
    /// Empty for errors raised before compilation started.
    pub fn completed_units(&self) -> &[String] {
        match self {
            Self::FileRemoval { completed, .. }
            | Self::CompileSpawn { completed, .. }
            | Self::CompileInvocation { completed, .. }
            | Self::LinkSpawn { completed, .. }
            | Self::LinkInvocation { completed, .. }
            | Self::Cancelled { completed } => completed,
            _ => &[],
        }
    }

    /// Phase of the build in which this error is raised
    pub fn phase(&self) -> BuildPhase {
        match self {
            Self::MetadataNotFound { .. }
            | Self::MetadataRead { .. }
            | Self::MalformedMetadata { .. }
            | Self::InvalidMetadata { .. } => BuildPhase::Loading,
            Self::DirectoryPreparation { .. } => BuildPhase::Preparing,
            Self::FileRemoval { .. }
            | Self::CompileSpawn { .. }
            | Self::CompileInvocation { .. }
            | Self::Cancelled { .. } => BuildPhase::Compiling,
            Self::LinkSpawn { .. } | Self::LinkInvocation { .. } => BuildPhase::Linking,
        }
    }

    /// Whether the error aborted the build before any compiler was started
    pub fn is_metadata_error(&self) -> bool {
        self.phase() == BuildPhase::Loading
    }
}
