use std::io;
use std::path::{Path, PathBuf};

use apsim_model::LEDGER_FILE_NAME;
use thiserror::Error;
use tracing::debug;

use crate::fsutil::write_atomic;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("recovery ledger {} is not accessible", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Single-line marker naming the input of the last successfully started backend.
///
/// The file holds the path and nothing else. Callers serialize access.
#[derive(Debug, Clone)]
pub struct RecoveryLedger {
    path: PathBuf,
}

impl RecoveryLedger {
    /// Ledger stored as `server-manager.lock` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(LEDGER_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the recorded path with `input`.
    pub async fn write(&self, input: &Path) -> Result<(), LedgerError> {
        let contents = input
            .to_str()
            .ok_or_else(|| LedgerError::NonUtf8Path(input.to_path_buf()))?;

        write_atomic(&self.path, &mut contents.as_bytes())
            .await
            .map_err(|source| self.io_error(source))?;

        debug!(ledger = %self.path.display(), input = contents, "ledger written");
        Ok(())
    }

    /// The recorded path, or `None` when no ledger exists or it is empty.
    pub async fn read(&self) -> Result<Option<PathBuf>, LedgerError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let recorded = contents.trim_end_matches(['\r', '\n']);
                if recorded.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(PathBuf::from(recorded)))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Forget the recorded path. A missing ledger is not an error.
    pub async fn clear(&self) -> Result<(), LedgerError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(ledger = %self.path.display(), "ledger cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
