//! CLI configuration via environment variables
//!
//! Subcommand flags read the same variables through clap; this covers the
//! bare `metabuild` invocation and output-wide settings such as color.

use metabuild_build::DEFAULT_METADATA_FILE;
use std::env;
use std::path::PathBuf;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Metadata file (METABUILD_META, defaults to ./meta.dat)
    pub metadata_path: PathBuf,
    /// Parallel compile jobs (METABUILD_JOBS, defaults to 1)
    pub jobs: usize,
    /// Delete objects after linking (METABUILD_ALWAYS_CLEAN=1)
    pub always_clean: bool,
    /// Default to JSON output (METABUILD_JSON=1)
    pub default_json: bool,
    /// Disable colored output (METABUILD_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            metadata_path: env::var("METABUILD_META")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_METADATA_FILE)),
            jobs: env::var("METABUILD_JOBS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1),
            always_clean: env_flag("METABUILD_ALWAYS_CLEAN"),
            default_json: env_flag("METABUILD_JSON"),
            no_color: env::var("METABUILD_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
        }
    }

    /// Apply the color preference to all colored output
    pub fn apply_color(&self) {
        if self.no_color {
            colored::control::set_override(false);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
