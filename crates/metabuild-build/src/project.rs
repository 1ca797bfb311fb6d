//! Project configuration and compilation units

use crate::error::{BuildError, BuildResult};
use crate::metadata::Metadata;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Driver used when the metadata names no compiler
pub const DEFAULT_COMPILER: &str = "c++";

/// Header extensions checked for a unit, in order
pub const HEADER_EXTENSIONS: [&str; 2] = ["h", "hpp"];

/// Immutable description of the project being built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
    /// Directory the metadata file lives in; all fragments are relative to it
    pub root: PathBuf,
    pub compiler: String,
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub objects_dir: PathBuf,
    pub exe: String,
    pub files: Vec<String>,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub lib_locations: Vec<String>,
    pub libs: Vec<String>,
    pub header_search_dirs: Vec<String>,
    /// Unrecognized scalar keys
    pub extra: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load a metadata file and validate it into a project configuration
    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();
        let metadata = Metadata::load(path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_metadata(root, &metadata)
    }

    /// Build a configuration from already parsed metadata
    pub fn from_metadata(root: impl Into<PathBuf>, metadata: &Metadata) -> BuildResult<Self> {
        let origin = metadata.origin();

        let scalar = |key: &str| metadata.scalar(key).map(str::to_string);
        let required = |key: &str| -> BuildResult<String> {
            scalar(key)
                .ok_or_else(|| BuildError::invalid(origin, format!("missing required key '{}'", key)))
        };
        let list = |key: &str| -> Vec<String> { metadata.list(key).unwrap_or_default().to_vec() };

        let compiler = scalar("compiler")
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPILER.to_string());

        let exe = required("exe")?;
        if exe.is_empty() {
            return Err(BuildError::invalid(origin, "'exe' must not be empty"));
        }

        let files = list("files");
        if files.is_empty() {
            return Err(BuildError::invalid(
                origin,
                "'files' must list at least one source file",
            ));
        }

        // Units share one objects directory, so names must not collide
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for file in &files {
            if let Some(previous) = seen.insert(unit_name(file), file) {
                return Err(BuildError::invalid(
                    origin,
                    format!(
                        "'{}' and '{}' both compile to {}.o",
                        previous,
                        file,
                        unit_name(file)
                    ),
                ));
            }
        }

        let extra = metadata
            .iter()
            .filter(|(key, _)| !is_known_key(key))
            .filter_map(|(key, value)| Some((key.to_string(), value.as_scalar()?.to_string())))
            .collect();

        Ok(Self {
            root: root.into(),
            compiler,
            source_dir: PathBuf::from(required("sourceDir")?),
            build_dir: PathBuf::from(required("buildDir")?),
            objects_dir: PathBuf::from(required("objectsDir")?),
            exe,
            files,
            compile_flags: list("compileFlags"),
            link_flags: list("linkFlags"),
            lib_locations: list("libLocations"),
            libs: list("libs"),
            header_search_dirs: list("headerSearchDirs"),
            extra,
        })
    }

    /// `root/source_dir`
    pub fn source_path(&self) -> PathBuf {
        self.root.join(&self.source_dir)
    }

    /// `root/build_dir`
    pub fn build_path(&self) -> PathBuf {
        self.root.join(&self.build_dir)
    }

    /// `root/build_dir/objects_dir`
    pub fn objects_path(&self) -> PathBuf {
        self.build_path().join(&self.objects_dir)
    }

    /// `root/build_dir/exe`
    pub fn exe_path(&self) -> PathBuf {
        self.build_path().join(&self.exe)
    }

    /// One compilation unit per entry of `files`, in order
    pub fn units(&self) -> Vec<CompilationUnit> {
        self.files
            .iter()
            .map(|file| CompilationUnit::new(self, file))
            .collect()
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "compiler" | "sourceDir" | "buildDir" | "objectsDir" | "exe"
    ) || crate::metadata::is_list_key(key)
}

/// One source file and the object it compiles to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationUnit {
    /// Source file name up to its first '.'
    pub name: String,
    /// Source file as listed in the metadata
    pub file: String,
    pub source_path: PathBuf,
    pub object_path: PathBuf,
    /// Same-basename headers next to the source, existing or not
    pub candidate_headers: Vec<PathBuf>,
}

impl CompilationUnit {
    pub fn new(config: &ProjectConfig, file: &str) -> Self {
        let source_path = config.source_path().join(file);
        let name = unit_name(file);

        let header_dir = source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.source_path());
        let candidate_headers = HEADER_EXTENSIONS
            .iter()
            .map(|ext| header_dir.join(format!("{}.{}", name, ext)))
            .collect();

        Self {
            object_path: config.objects_path().join(format!("{}.o", name)),
            name,
            file: file.to_string(),
            source_path,
            candidate_headers,
        }
    }
}

/// `dir/main.test.cpp` -> `main`
fn unit_name(file: &str) -> String {
    let base = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    match base.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base,
    }
}
