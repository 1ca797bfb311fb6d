//! Compiler and linker command composition
//!
//! Everything here is pure: the same configuration always yields the same
//! commands. Flags are written in metadata without their leading dash
//! (`O3`, `std=c++11`); one is added unless the flag already has it.
//!
//! Ordering matters and is fixed:
//! - compile: `<compiler> [flags] [-I<dir>...] -c <source> -o <object>`
//! - link: `<compiler> [flags] -o <exe> <objects...> [-L<dir>...] [-l<lib>...]`

use crate::project::{CompilationUnit, ProjectConfig};
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Prefix for header search directories
pub const INCLUDE_PREFIX: &str = "-I";
/// Prefix for library search directories
pub const LIB_DIR_PREFIX: &str = "-L";
/// Prefix for library names
pub const LIB_PREFIX: &str = "-l";

/// An external tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Single-line rendering for diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Process ready to spawn, run from `cwd`
    pub fn to_process(&self, cwd: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.args.iter().map(OsString::from))
            .current_dir(if cwd.as_os_str().is_empty() {
                Path::new(".")
            } else {
                cwd
            });
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// `O3` -> `-O3`; `-Wall` stays as is
fn dashed(flag: &str) -> String {
    if flag.starts_with('-') {
        flag.to_string()
    } else {
        format!("-{}", flag)
    }
}

fn prefixed<'a>(
    prefix: &'a str,
    values: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    values.iter().map(move |value| format!("{}{}", prefix, value))
}

/// Compile flags followed by header search directories, in metadata order
pub fn compile_flags(config: &ProjectConfig) -> Vec<String> {
    config
        .compile_flags
        .iter()
        .map(|flag| dashed(flag))
        .chain(prefixed(INCLUDE_PREFIX, &config.header_search_dirs))
        .collect()
}

/// Link flags, in metadata order
pub fn link_flags(config: &ProjectConfig) -> Vec<String> {
    config.link_flags.iter().map(|flag| dashed(flag)).collect()
}

/// Compile flags joined by single spaces; empty when nothing is configured
pub fn compile_flag_string(config: &ProjectConfig) -> String {
    compile_flags(config).join(" ")
}

/// Link flags joined by single spaces; empty when nothing is configured
pub fn link_flag_string(config: &ProjectConfig) -> String {
    link_flags(config).join(" ")
}

/// `<compiler> [flags] -c <source> -o <object>`
pub fn compile_command(config: &ProjectConfig, unit: &CompilationUnit) -> ToolCommand {
    ToolCommand::new(&config.compiler)
        .args(compile_flags(config))
        .arg("-c")
        .arg(path_arg(&relative_to_root(config, &unit.source_path)))
        .arg("-o")
        .arg(path_arg(&relative_to_root(config, &unit.object_path)))
}

/// Objects handed to the linker
#[derive(Debug, Clone, Copy)]
pub enum LinkInputs<'a> {
    /// Concrete object files, already expanded
    Objects(&'a [PathBuf]),
    /// `objects_dir/*.o`, as a shell would see it (display only)
    Glob,
}

/// `<compiler> [flags] -o <exe> <objects> [-L...] [-l...]`
pub fn link_command(config: &ProjectConfig, inputs: LinkInputs<'_>) -> ToolCommand {
    let command = ToolCommand::new(&config.compiler)
        .args(link_flags(config))
        .arg("-o")
        .arg(path_arg(&relative_to_root(config, &config.exe_path())));

    let command = match inputs {
        LinkInputs::Objects(objects) => command.args(
            objects
                .iter()
                .map(|object| path_arg(&relative_to_root(config, object))),
        ),
        LinkInputs::Glob => {
            let objects = relative_to_root(config, &config.objects_path());
            command.arg(path_arg(&objects.join("*.o")))
        }
    };

    command
        .args(prefixed(LIB_DIR_PREFIX, &config.lib_locations))
        .args(prefixed(LIB_PREFIX, &config.libs))
}

/// Commands run from the project root, so paths are given relative to it
fn relative_to_root(config: &ProjectConfig, path: &Path) -> PathBuf {
    path.strip_prefix(&config.root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
