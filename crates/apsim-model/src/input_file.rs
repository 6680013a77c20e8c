use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension given to generated primary input files.
pub const INPUT_EXTENSION: &str = "apsimx";

/// Extensions of the database files the backend writes next to its input.
pub const DERIVED_EXTENSIONS: [&str; 3] = ["db", "db-shm", "db-wal"];

/// What a managed file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    /// Input the backend process runs against.
    Primary,
    /// Side file (e.g. weather data) read by the backend but never run directly.
    Auxiliary,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Primary => "primary",
            FileKind::Auxiliary => "auxiliary",
        }
    }
}

/// Primary input file owned by the manager.
///
/// The backend derives its working database from this path by swapping the
/// extension, so the artifacts are always siblings of the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputFile(PathBuf);

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Database artifacts the backend creates for this input, in deletion order.
    pub fn derived_artifacts(&self) -> Vec<PathBuf> {
        DERIVED_EXTENSIONS
            .iter()
            .map(|ext| self.0.with_extension(ext))
            .collect()
    }

    /// The input itself followed by its derived artifacts.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(1 + DERIVED_EXTENSIONS.len());
        paths.push(self.0.clone());
        paths.extend(self.derived_artifacts());
        paths
    }
}

impl std::fmt::Display for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
