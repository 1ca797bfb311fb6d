//! metabuild build engine
//!
//! Compiles and links a native C/C++ project described by a small metadata
//! file, without a general-purpose build tool:
//! - Metadata parsing into an immutable project configuration
//! - Per-unit staleness detection from file modification times
//! - Compiler and linker command composition
//! - Build sequencing with optional parallel compilation and cancellation
//!
//! ```no_run
//! use metabuild_build::{Builder, OutputMode};
//!
//! let mut builder = Builder::new("meta.dat").with_output_mode(OutputMode::Quiet);
//! let context = builder.build().unwrap();
//! println!("{} unit(s) compiled", context.stats.compiled_units);
//! ```

pub mod builder;
pub mod command;
pub mod error;
pub mod metadata;
pub mod output;
pub mod project;
pub mod staleness;

// Re-export main types
pub use builder::{
    BuildConfig, BuildContext, BuildPhase, BuildPlan, BuildStats, Builder, CancellationToken,
    ObjectPolicy, PlannedUnit, UnitOutcome, UnitReport,
};
pub use command::{
    compile_command, compile_flag_string, link_command, link_flag_string, LinkInputs,
    ToolCommand,
};
pub use error::{BuildError, BuildResult};
pub use metadata::{MetaValue, Metadata, DEFAULT_METADATA_FILE};
pub use output::{BuildProgress, BuildSummary, OutputMode, UnitSummary};
pub use project::{CompilationUnit, ProjectConfig, DEFAULT_COMPILER};
pub use staleness::{StaleReason, Staleness, StalenessAnalyzer};
