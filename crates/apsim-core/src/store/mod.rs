use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apsim_model::{INPUT_EXTENSION, InputFile, LEDGER_FILE_NAME};
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::fsutil::write_atomic;

/// Upper bound on name generation attempts before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Prefix of every generated primary input file name.
pub const INPUT_FILE_PREFIX: &str = "apsim-input-file-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("output directory does not exist: {}", .0.display())]
    OutputDirectoryUnavailable(PathBuf),

    #[error("unable to generate a unique file name after {attempts} attempts")]
    NameGenerationExhausted { attempts: u32 },

    #[error("invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

type NameSource = Arc<dyn Fn() -> Uuid + Send + Sync>;

/// Writes uploads into the data directory.
///
/// Primary inputs get a fresh `apsim-input-file-<uuid>.apsimx` name; auxiliary
/// files keep the caller's name and overwrite whatever was there.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    names: NameSource,
    max_attempts: u32,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            names: Arc::new(Uuid::new_v4),
            max_attempts: MAX_NAME_ATTEMPTS,
        }
    }

    /// Replace the uuid source used for generated names.
    pub fn with_name_source<F>(mut self, names: F) -> Self
    where
        F: Fn() -> Uuid + Send + Sync + 'static,
    {
        self.names = Arc::new(names);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a primary input under a generated, previously unused name.
    #[instrument(level = "debug", skip_all)]
    pub async fn save_primary<R>(&self, src: &mut R) -> Result<InputFile, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.ensure_dir().await?;
        let path = self.unique_input_path().await?;
        let written = write_atomic(&path, src)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = written, "primary input saved");
        Ok(InputFile::new(path))
    }

    /// Persist an auxiliary file under `name`, replacing any existing file.
    ///
    /// Concurrent writers of the same name do not interleave: each rename is
    /// atomic and the last one wins.
    #[instrument(level = "debug", skip(self, src))]
    pub async fn save_auxiliary<R>(&self, name: &str, src: &mut R) -> Result<PathBuf, StoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        validate_file_name(name)?;
        self.ensure_dir().await?;

        let path = self.dir.join(name);
        let written = write_atomic(&path, src)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), bytes = written, "auxiliary file saved");
        Ok(path)
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(StoreError::OutputDirectoryUnavailable(self.dir.clone())),
        }
    }

    async fn unique_input_path(&self) -> Result<PathBuf, StoreError> {
        for attempt in 1..=self.max_attempts {
            let name = format!("{INPUT_FILE_PREFIX}{}.{INPUT_EXTENSION}", (self.names)());
            let path = self.dir.join(name);
            let taken = tokio::fs::try_exists(&path)
                .await
                .map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
            if !taken {
                if attempt > 1 {
                    debug!(attempts = attempt, "generated name after collisions");
                }
                return Ok(path);
            }
        }
        Err(StoreError::NameGenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Auxiliary names must be a single plain component that cannot shadow
/// manager-owned files.
fn validate_file_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name == LEDGER_FILE_NAME
        || name.starts_with(INPUT_FILE_PREFIX);
    if invalid {
        return Err(StoreError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
