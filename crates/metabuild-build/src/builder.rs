//! Build orchestration and pipeline management
use crate::command::{compile_command, link_command, LinkInputs, ToolCommand};
use crate::error::{BuildError, BuildResult};
use crate::output::{BuildProgress, OutputMode};
use crate::project::{CompilationUnit, ProjectConfig};
use crate::staleness::{StaleReason, Staleness, StalenessAnalyzer};

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Stage of a build run. `Failed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    Loading,
    Preparing,
    Analyzing,
    Compiling,
    Linking,
    Done,
    Failed,
}

impl BuildPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Preparing => "preparing",
            Self::Analyzing => "analyzing",
            Self::Compiling => "compiling",
            Self::Linking => "linking",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// What happens to object files once the executable is linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectPolicy {
    /// Keep objects and reuse the ones that are not stale
    #[default]
    Incremental,
    /// Delete every unit's object after linking; each build compiles everything
    AlwaysClean,
}

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Concurrent compiler processes. 1 is sequential, 0 means one per CPU.
    pub jobs: usize,
    pub object_policy: ObjectPolicy,
    pub output_mode: OutputMode,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            object_policy: ObjectPolicy::Incremental,
            output_mode: OutputMode::Normal,
        }
    }
}

/// Cooperative cancellation, honoured between units and before linking.
/// A compiler process that is already running is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build statistics
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    pub total_units: usize,
    pub compiled_units: usize,
    pub reused_units: usize,
    /// Wall-clock time of the whole build
    pub total_time: Duration,
    pub compilation_time: Duration,
    pub linking_time: Duration,
}

/// Result for a single unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Existing object reused
    UpToDate,
    Compiled {
        reason: StaleReason,
        duration: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub name: String,
    pub object_path: PathBuf,
    pub outcome: UnitOutcome,
}

impl UnitReport {
    pub fn compiled(&self) -> bool {
        matches!(self.outcome, UnitOutcome::Compiled { .. })
    }
}

/// Build context - result of a successful build
#[derive(Debug)]
pub struct BuildContext {
    pub project: ProjectConfig,
    /// One report per unit, in `files` order
    pub units: Vec<UnitReport>,
    pub executable: PathBuf,
    pub link_command: ToolCommand,
    pub stats: BuildStats,
}

impl BuildContext {
    /// Names of the units compiled during this build
    pub fn compiled_units(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|report| report.compiled())
            .map(|report| report.name.as_str())
            .collect()
    }
}

/// A unit as it would be handled by the next build
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub unit: CompilationUnit,
    pub staleness: Staleness,
    pub command: ToolCommand,
}

/// What a build would do, computed without touching the filesystem
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub project: ProjectConfig,
    pub units: Vec<PlannedUnit>,
    pub link_command: ToolCommand,
}

impl BuildPlan {
    pub fn stale_units(&self) -> impl Iterator<Item = &PlannedUnit> {
        self.units.iter().filter(|planned| planned.staleness.is_stale())
    }
}

/// Why a single unit could not be compiled
#[derive(Debug)]
enum UnitFailure {
    Removal { path: PathBuf, error: io::Error },
    Spawn(io::Error),
    Exit { code: Option<i32>, stderr: String },
    Cancelled,
}

impl UnitFailure {
    fn into_error(self, unit: &str, completed: Vec<String>) -> BuildError {
        match self {
            Self::Removal { path, error } => BuildError::FileRemoval {
                path,
                error,
                completed,
            },
            Self::Spawn(error) => BuildError::CompileSpawn {
                unit: unit.to_string(),
                error,
                completed,
            },
            Self::Exit { code, stderr } => BuildError::CompileInvocation {
                unit: unit.to_string(),
                exit_code: code,
                stderr,
                completed,
            },
            Self::Cancelled => BuildError::Cancelled { completed },
        }
    }
}

type UnitResult = Result<UnitReport, UnitFailure>;

/// Main builder for orchestrating builds
pub struct Builder {
    /// Metadata file describing the project
    metadata_path: PathBuf,
    config: BuildConfig,
    progress: BuildProgress,
    cancel: CancellationToken,
    phase: BuildPhase,
}

impl Builder {
    /// Create a builder for the project described by `metadata_path`.
    /// Nothing is read until [`Builder::build`] or [`Builder::plan`].
    pub fn new(metadata_path: impl AsRef<Path>) -> Self {
        Self {
            metadata_path: metadata_path.as_ref().to_path_buf(),
            config: BuildConfig::default(),
            progress: BuildProgress::default(),
            cancel: CancellationToken::new(),
            phase: BuildPhase::Idle,
        }
    }

    /// Set build configuration
    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.progress = BuildProgress::new(config.output_mode);
        self.config = config;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn with_object_policy(mut self, policy: ObjectPolicy) -> Self {
        self.config.object_policy = policy;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self.progress = BuildProgress::new(mode);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this builder's next unit boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Execute the build
    pub fn build(&mut self) -> BuildResult<BuildContext> {
        let result = self.run();
        if result.is_err() {
            self.phase = BuildPhase::Failed;
        }
        result
    }

    fn enter(&mut self, phase: BuildPhase) {
        self.phase = phase;
        self.progress.phase(phase);
    }

    fn run(&mut self) -> BuildResult<BuildContext> {
        let build_start = Instant::now();

        self.enter(BuildPhase::Loading);
        let project = ProjectConfig::load(&self.metadata_path)?;

        self.enter(BuildPhase::Preparing);
        prepare_directories(&project)?;

        self.enter(BuildPhase::Analyzing);
        let units = project.units();
        let decisions = StalenessAnalyzer::new().analyze_all(&units);

        self.enter(BuildPhase::Compiling);
        let compile_start = Instant::now();
        let reports = self.compile_units(&project, &decisions)?;
        let compilation_time = compile_start.elapsed();

        let completed: Vec<String> = reports
            .iter()
            .filter(|report| report.compiled())
            .map(|report| report.name.clone())
            .collect();

        if self.cancel.is_cancelled() {
            return Err(BuildError::Cancelled { completed });
        }

        self.enter(BuildPhase::Linking);
        let link_start = Instant::now();
        let link_command = self.link(&project, &completed)?;
        let linking_time = link_start.elapsed();

        if self.config.object_policy == ObjectPolicy::AlwaysClean {
            for unit in &units {
                remove_if_exists(&unit.object_path)
                    .map_err(|e| BuildError::removal(&unit.object_path, e, &completed))?;
            }
        }

        let stats = BuildStats {
            total_units: units.len(),
            compiled_units: completed.len(),
            reused_units: units.len() - completed.len(),
            total_time: build_start.elapsed(),
            compilation_time,
            linking_time,
        };

        self.enter(BuildPhase::Done);
        self.progress.finished(&stats);

        Ok(BuildContext {
            executable: project.exe_path(),
            project,
            units: reports,
            link_command,
            stats,
        })
    }

    /// Compile the stale units, reusing the rest
    fn compile_units(
        &self,
        project: &ProjectConfig,
        decisions: &[(&CompilationUnit, Staleness)],
    ) -> BuildResult<Vec<UnitReport>> {
        self.progress.compile_banner();

        if self.config.jobs == 1 {
            return self.compile_sequential(project, decisions);
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
        {
            Ok(pool) => {
                let abort = AtomicBool::new(false);
                let results: Vec<UnitResult> = pool.install(|| {
                    decisions
                        .par_iter()
                        .map(|(unit, staleness)| {
                            if abort.load(Ordering::SeqCst) {
                                return Err(UnitFailure::Cancelled);
                            }
                            let result = self.process_unit(project, unit, staleness);
                            // Units not yet started are skipped after a failure
                            if let Err(failure) = &result {
                                if !matches!(failure, UnitFailure::Cancelled) {
                                    abort.store(true, Ordering::SeqCst);
                                }
                            }
                            result
                        })
                        .collect()
                });
                collect_results(decisions, results)
            }
            // No worker threads available; fall back to running in place
            Err(_) => self.compile_sequential(project, decisions),
        }
    }

    fn compile_sequential(
        &self,
        project: &ProjectConfig,
        decisions: &[(&CompilationUnit, Staleness)],
    ) -> BuildResult<Vec<UnitReport>> {
        let mut reports = Vec::with_capacity(decisions.len());
        let mut completed = Vec::new();

        for (unit, staleness) in decisions {
            match self.process_unit(project, unit, staleness) {
                Ok(report) => {
                    if report.compiled() {
                        completed.push(report.name.clone());
                    }
                    reports.push(report);
                }
                Err(failure) => return Err(failure.into_error(&unit.name, completed)),
            }
        }

        Ok(reports)
    }

    fn process_unit(
        &self,
        project: &ProjectConfig,
        unit: &CompilationUnit,
        staleness: &Staleness,
    ) -> UnitResult {
        let outcome = match staleness {
            Staleness::UpToDate => {
                self.progress.command(&compile_command(project, unit));
                UnitOutcome::UpToDate
            }
            Staleness::Stale(reason) => {
                if self.cancel.is_cancelled() {
                    return Err(UnitFailure::Cancelled);
                }
                let duration = self.compile_unit(project, unit, reason)?;
                UnitOutcome::Compiled {
                    reason: reason.clone(),
                    duration,
                }
            }
        };

        let report = UnitReport {
            name: unit.name.clone(),
            object_path: unit.object_path.clone(),
            outcome,
        };
        self.progress.unit(&report);
        Ok(report)
    }

    /// Remove the stale object and run the compiler for one unit
    fn compile_unit(
        &self,
        project: &ProjectConfig,
        unit: &CompilationUnit,
        reason: &StaleReason,
    ) -> Result<Duration, UnitFailure> {
        self.progress.stale(&unit.name, reason);

        let removed = remove_if_exists(&unit.object_path).map_err(|error| UnitFailure::Removal {
            path: unit.object_path.clone(),
            error,
        })?;
        if removed {
            self.progress.removed(&unit.object_path);
        }

        let command = compile_command(project, unit);
        self.progress.command(&command);

        let start = Instant::now();
        let output = command
            .to_process(&project.root)
            .output()
            .map_err(UnitFailure::Spawn)?;
        let stderr = self.report_output(&output);

        if !output.status.success() {
            return Err(UnitFailure::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(start.elapsed())
    }

    /// Replace the executable with a fresh link of every object
    fn link(&self, project: &ProjectConfig, completed: &[String]) -> BuildResult<ToolCommand> {
        let exe = project.exe_path();

        let removed = remove_if_exists(&exe).map_err(|e| BuildError::removal(&exe, e, completed))?;

        let objects = object_files(&project.objects_path());
        let command = link_command(project, LinkInputs::Objects(&objects));

        self.progress.link_banner(removed.then_some(exe.as_path()));
        self.progress.command(&command);

        let output = command
            .to_process(&project.root)
            .output()
            .map_err(|error| BuildError::LinkSpawn {
                exe: exe.clone(),
                error,
                completed: completed.to_vec(),
            })?;
        let stderr = self.report_output(&output);

        if !output.status.success() {
            return Err(BuildError::LinkInvocation {
                exe,
                exit_code: output.status.code(),
                stderr,
                completed: completed.to_vec(),
            });
        }

        Ok(command)
    }

    fn report_output(&self, output: &Output) -> String {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        self.progress.diagnostics(&stdout);
        self.progress.diagnostics(&stderr);
        stderr
    }

    /// Work out what the next build would do without running anything
    pub fn plan(&self) -> BuildResult<BuildPlan> {
        let project = ProjectConfig::load(&self.metadata_path)?;
        let analyzer = StalenessAnalyzer::new();

        let units = project
            .units()
            .into_iter()
            .map(|unit| PlannedUnit {
                staleness: analyzer.analyze(&unit),
                command: compile_command(&project, &unit),
                unit,
            })
            .collect();

        Ok(BuildPlan {
            link_command: link_command(&project, LinkInputs::Glob),
            project,
            units,
        })
    }

    /// Delete every unit's object and the executable. Returns what was removed.
    pub fn clean(&self) -> BuildResult<Vec<PathBuf>> {
        let project = ProjectConfig::load(&self.metadata_path)?;

        let targets = project
            .units()
            .into_iter()
            .map(|unit| unit.object_path)
            .chain(std::iter::once(project.exe_path()));

        let mut removed = Vec::new();
        for path in targets {
            if remove_if_exists(&path).map_err(|e| BuildError::removal(&path, e, &[]))? {
                removed.push(path);
            }
        }

        Ok(removed)
    }
}

/// Order results by unit and turn the first real failure into an error
fn collect_results(
    decisions: &[(&CompilationUnit, Staleness)],
    results: Vec<UnitResult>,
) -> BuildResult<Vec<UnitReport>> {
    let completed: Vec<String> = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .filter(|report| report.compiled())
        .map(|report| report.name.clone())
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut cancelled = false;
    let mut failure = None;

    for ((unit, _), result) in decisions.iter().zip(results) {
        match result {
            Ok(report) => reports.push(report),
            Err(UnitFailure::Cancelled) => cancelled = true,
            Err(other) => {
                failure.get_or_insert((unit.name.clone(), other));
            }
        }
    }

    if let Some((unit, failure)) = failure {
        return Err(failure.into_error(&unit, completed));
    }
    if cancelled {
        return Err(BuildError::Cancelled { completed });
    }
    Ok(reports)
}

/// Create `build_dir/objects_dir` if missing
fn prepare_directories(project: &ProjectConfig) -> BuildResult<()> {
    for dir in [project.build_path(), project.objects_path()] {
        fs::create_dir_all(&dir).map_err(|e| BuildError::directory(&dir, e))?;
    }
    Ok(())
}

/// Remove a file, reporting whether it existed
fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// `*.o` files directly inside `dir`, sorted by name
fn object_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("o"))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_config_default() {
        let config = BuildConfig::default();
        assert_eq!(config.jobs, 1);
        assert_eq!(config.object_policy, ObjectPolicy::Incremental);
        assert_eq!(config.output_mode, OutputMode::Normal);
    }

    #[test]
    fn test_new_builder_is_idle() {
        let builder = Builder::new("meta.dat");
        assert_eq!(builder.phase(), BuildPhase::Idle);
    }

    #[test]
    fn test_cancellation_token_shared() {
        let builder = Builder::new("meta.dat");
        let token = builder.cancellation_token();
        token.cancel();
        assert!(builder.cancel.is_cancelled());
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.o");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, b"obj").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_object_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.o", "a.o", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.o")).unwrap();

        let objects = object_files(dir.path());
        assert_eq!(objects, vec![dir.path().join("a.o"), dir.path().join("b.o")]);
    }

    #[test]
    fn test_object_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(object_files(&dir.path().join("absent")).is_empty());
    }
}
