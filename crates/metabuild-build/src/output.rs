//! Progress reporting and build summaries

use crate::builder::{BuildPhase, BuildStats, UnitOutcome, UnitReport};
use crate::command::ToolCommand;
use crate::staleness::StaleReason;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const RULE: &str = "______________________";

/// How much the builder prints while working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Commands and per-unit status
    #[default]
    Normal,
    /// Normal plus staleness reasons, phases and timings
    Verbose,
    /// Errors only
    Quiet,
    /// Nothing while building; the caller prints a JSON summary
    Json,
}

/// Prints build progress according to an [`OutputMode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildProgress {
    mode: OutputMode,
}

impl BuildProgress {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    fn normal(&self) -> bool {
        matches!(self.mode, OutputMode::Normal | OutputMode::Verbose)
    }

    fn verbose(&self) -> bool {
        self.mode == OutputMode::Verbose
    }

    pub fn phase(&self, phase: BuildPhase) {
        if self.verbose() {
            println!("[{}]", phase.name());
        }
    }

    pub fn compile_banner(&self) {
        if self.normal() {
            println!("Compiling files:\n{}\n", RULE);
        }
    }

    pub fn command(&self, command: &ToolCommand) {
        if self.normal() {
            println!("$ {}", command);
        }
    }

    pub fn stale(&self, unit: &str, reason: &StaleReason) {
        if self.verbose() {
            println!("--> {}: {}", unit, reason);
        }
    }

    pub fn removed(&self, path: &Path) {
        if self.verbose() {
            println!("--> Removed {}", path.display());
        }
    }

    pub fn unit(&self, report: &UnitReport) {
        if !self.normal() {
            return;
        }
        match &report.outcome {
            UnitOutcome::UpToDate => println!("--> No changes, continuing.\n"),
            UnitOutcome::Compiled { duration, .. } if self.verbose() => {
                println!("--> Compiled {} in {:.3}s\n", report.name, duration.as_secs_f64())
            }
            UnitOutcome::Compiled { .. } => println!(),
        }
    }

    /// Compiler diagnostics are shown in every mode but JSON
    pub fn diagnostics(&self, stderr: &str) {
        if self.mode != OutputMode::Json && !stderr.trim().is_empty() {
            eprintln!("{}", stderr.trim_end());
        }
    }

    pub fn link_banner(&self, removed_exe: Option<&Path>) {
        if !self.normal() {
            return;
        }
        if let Some(exe) = removed_exe {
            println!("Deleted old executable {}.", exe.display());
        }
        println!("{}\n\nNow linking:", RULE);
    }

    pub fn finished(&self, stats: &BuildStats) {
        if !self.normal() {
            return;
        }
        if self.verbose() {
            println!(
                "\nCompiled {} of {} unit(s) in {}, linked in {}",
                stats.compiled_units,
                stats.total_units,
                seconds(stats.compilation_time),
                seconds(stats.linking_time)
            );
        }
        println!(
            "{}\n\n--> Successfully compiled in {}.\n{}",
            RULE,
            seconds(stats.total_time),
            RULE
        );
    }
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// Serializable result of a finished build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub success: bool,
    pub executable: String,
    pub total_units: usize,
    pub compiled_units: usize,
    pub reused_units: usize,
    pub total_time: f64,
    pub compilation_time: f64,
    pub linking_time: f64,
    pub units: Vec<UnitSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub name: String,
    pub object: String,
    pub compiled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl BuildSummary {
    pub fn new(executable: &Path, stats: &BuildStats, units: &[UnitReport]) -> Self {
        Self {
            success: true,
            executable: executable.display().to_string(),
            total_units: stats.total_units,
            compiled_units: stats.compiled_units,
            reused_units: stats.reused_units,
            total_time: stats.total_time.as_secs_f64(),
            compilation_time: stats.compilation_time.as_secs_f64(),
            linking_time: stats.linking_time.as_secs_f64(),
            units: units.iter().map(UnitSummary::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<&UnitReport> for UnitSummary {
    fn from(report: &UnitReport) -> Self {
        let (compiled, reason, time) = match &report.outcome {
            UnitOutcome::UpToDate => (false, None, None),
            UnitOutcome::Compiled { reason, duration } => {
                (true, Some(reason.to_string()), Some(duration.as_secs_f64()))
            }
        };
        Self {
            name: report.name.clone(),
            object: report.object_path.display().to_string(),
            compiled,
            reason,
            time,
        }
    }
}
