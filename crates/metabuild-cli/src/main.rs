use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;
mod config;

/// Metadata-driven incremental builds for C/C++ projects.
///
/// Reads a project description (by default `meta.dat` in the current
/// directory), recompiles the sources whose object files are out of date
/// and relinks the executable.
///
/// EXAMPLES:
///     metabuild                        Build using ./meta.dat
///     metabuild build --jobs 4         Compile up to 4 files at once
///     metabuild plan                   Show what a build would run
///     metabuild clean                  Remove objects and the executable
///
/// ENVIRONMENT VARIABLES:
///     METABUILD_META          Metadata file to use instead of ./meta.dat
///     METABUILD_JOBS          Default number of parallel compile jobs
///     METABUILD_ALWAYS_CLEAN  Set to '1' to delete objects after linking
///     METABUILD_JSON          Set to '1' for JSON output by default
///     NO_COLOR                Set to disable colored output
#[derive(Parser)]
#[command(name = "metabuild")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile stale sources and link the executable
    ///
    /// A source is recompiled when its object file is missing, or when the
    /// source or its same-named header (.h/.hpp) is newer than the object.
    /// The executable is always relinked.
    ///
    /// EXAMPLES:
    ///     metabuild build                  Incremental build
    ///     metabuild build --always-clean   Delete objects after linking
    ///     metabuild build --json           Print a JSON summary
    #[command(visible_alias = "b")]
    Build {
        /// Metadata file describing the project
        #[arg(long, short = 'm', env = "METABUILD_META", default_value = metabuild_build::DEFAULT_METADATA_FILE)]
        meta: PathBuf,
        /// Number of compiler processes to run at once (0 = one per CPU)
        #[arg(long, short = 'j', env = "METABUILD_JOBS", default_value_t = 1)]
        jobs: usize,
        /// Delete object files after linking instead of reusing them
        #[arg(long, env = "METABUILD_ALWAYS_CLEAN", value_parser = BoolishValueParser::new())]
        always_clean: bool,
        /// Verbose output (staleness reasons and timings)
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Quiet output (errors only)
        #[arg(long, short = 'q')]
        quiet: bool,
        /// JSON output
        #[arg(long, env = "METABUILD_JSON", value_parser = BoolishValueParser::new())]
        json: bool,
    },

    /// Show the commands the next build would run, without running them
    ///
    /// EXAMPLES:
    ///     metabuild plan                   List units and commands
    ///     metabuild plan --json            Same, as JSON
    #[command(visible_alias = "p")]
    Plan {
        /// Metadata file describing the project
        #[arg(long, short = 'm', env = "METABUILD_META", default_value = metabuild_build::DEFAULT_METADATA_FILE)]
        meta: PathBuf,
        /// JSON output
        #[arg(long, env = "METABUILD_JSON", value_parser = BoolishValueParser::new())]
        json: bool,
    },

    /// Remove object files and the executable
    Clean {
        /// Metadata file describing the project
        #[arg(long, short = 'm', env = "METABUILD_META", default_value = metabuild_build::DEFAULT_METADATA_FILE)]
        meta: PathBuf,
        /// Quiet output (errors only)
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     metabuild completions bash > ~/.bash_completions/metabuild.bash
    ///     metabuild completions zsh > ~/.zfunc/_metabuild
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    cli_config.apply_color();

    match cli.command {
        None => {
            commands::build::run(commands::build::BuildArgs::from_config(&cli_config))?;
        }
        Some(Commands::Build {
            meta,
            jobs,
            always_clean,
            verbose,
            quiet,
            json,
        }) => {
            // Command-line flag overrides environment variable
            let use_json = json || cli_config.default_json;
            let args = commands::build::BuildArgs {
                meta,
                jobs,
                always_clean,
                verbose,
                quiet,
                json: use_json,
            };
            commands::build::run(args)?;
        }
        Some(Commands::Plan { meta, json }) => {
            commands::plan::run(&meta, json || cli_config.default_json)?;
        }
        Some(Commands::Clean { meta, quiet }) => {
            commands::clean::run(&meta, quiet)?;
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "metabuild", &mut io::stdout());
        }
    }

    Ok(())
}
