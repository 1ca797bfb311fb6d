//! Build command - incremental compile and link from a metadata file

use crate::config::Config;
use anyhow::{Context, Result};
use colored::Colorize;
use metabuild_build::{
    BuildError, BuildSummary, Builder, ObjectPolicy, OutputMode, DEFAULT_METADATA_FILE,
};
use std::path::PathBuf;

/// Build command arguments
pub struct BuildArgs {
    /// Metadata file describing the project
    pub meta: PathBuf,
    /// Number of parallel compile jobs
    pub jobs: usize,
    /// Delete objects after linking
    pub always_clean: bool,
    /// Verbose output
    pub verbose: bool,
    /// Quiet output (errors only)
    pub quiet: bool,
    /// JSON output
    pub json: bool,
}

impl Default for BuildArgs {
    fn default() -> Self {
        Self {
            meta: PathBuf::from(DEFAULT_METADATA_FILE),
            jobs: 1,
            always_clean: false,
            verbose: false,
            quiet: false,
            json: false,
        }
    }
}

impl BuildArgs {
    /// Arguments for a bare `metabuild` invocation
    pub fn from_config(config: &Config) -> Self {
        Self {
            meta: config.metadata_path.clone(),
            jobs: config.jobs,
            always_clean: config.always_clean,
            json: config.default_json,
            ..Default::default()
        }
    }
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let output_mode = determine_output_mode(&args);
    let policy = determine_object_policy(&args);

    let mut builder = Builder::new(&args.meta)
        .with_jobs(args.jobs)
        .with_object_policy(policy)
        .with_output_mode(output_mode);

    let context = match builder.build() {
        Ok(context) => context,
        Err(err) => {
            report_failure(&err, args.json);
            return Err(err).with_context(|| format!("Build of {} failed", args.meta.display()));
        }
    };

    if args.json {
        let summary = BuildSummary::new(&context.executable, &context.stats, &context.units);
        println!("{}", summary.to_json());
    } else if !args.quiet {
        println!(
            "{} {} ({} compiled, {} reused)",
            "Built".green().bold(),
            context.executable.display(),
            context.stats.compiled_units,
            context.stats.reused_units
        );
    }

    Ok(())
}

/// Tell the user what can be resumed before the error is propagated
fn report_failure(err: &BuildError, json: bool) {
    let completed = err.completed_units();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "success": false,
                "phase": err.phase().name(),
                "error": err.to_string(),
                "completed": completed,
            })
        );
    } else if !completed.is_empty() {
        eprintln!(
            "{} compiled before the failure: {}",
            "note:".yellow().bold(),
            completed.join(", ")
        );
    }
}

/// Determine output mode from arguments
fn determine_output_mode(args: &BuildArgs) -> OutputMode {
    if args.json {
        OutputMode::Json
    } else if args.quiet {
        OutputMode::Quiet
    } else if args.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    }
}

fn determine_object_policy(args: &BuildArgs) -> ObjectPolicy {
    if args.always_clean {
        ObjectPolicy::AlwaysClean
    } else {
        ObjectPolicy::Incremental
    }
}
