use std::error::Error as StdError;

use apsim_exec::ExecError;
use thiserror::Error;

use crate::{config::ConfigError, ledger::LedgerError, store::StoreError};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("backend swap did not run to completion")]
    SwapInterrupted(#[from] tokio::task::JoinError),
}

/// Flatten an error and its `source()` chain into one line.
///
/// Messages are joined with ` -> `; empty messages are skipped.
pub fn aggregate_message(error: &(dyn StdError + 'static)) -> String {
    let mut parts = Vec::new();
    let mut current = Some(error);
    while let Some(err) = current {
        let msg = err.to_string();
        if !msg.is_empty() {
            parts.push(msg);
        }
        current = err.source();
    }
    parts.join(" -> ")
}
