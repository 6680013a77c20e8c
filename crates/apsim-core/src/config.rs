use std::net::SocketAddr;
use std::path::PathBuf;

use apsim_exec::BackendCommand;
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "SERVER_MANAGER_DATA_DIR";
pub const ENV_BACKEND: &str = "SERVER_MANAGER_BACKEND";
pub const ENV_LISTEN: &str = "SERVER_MANAGER_LISTEN";
pub const ENV_MAX_UPLOAD_MB: &str = "SERVER_MANAGER_MAX_UPLOAD_MB";
pub const ENV_LOG_LEVEL: &str = "SERVER_MANAGER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SERVER_MANAGER_LOG_FORMAT";

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 30;

const MEGABYTE: u64 = 1 << 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable not set: '{0}'")]
    MissingVariable(&'static str),

    #[error("invalid value for '{name}': '{value}' ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("data directory does not exist or is not a directory: {}", .0.display())]
    DataDirUnavailable(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Where uploads, backend databases and the ledger live.
    pub data_dir: PathBuf,
    pub backend: BackendCommand,
    pub listen: SocketAddr,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
    /// `EnvFilter` directive, validated by the logger.
    pub log_level: String,
    /// `text`, `json` or `journald`, validated by the logger.
    pub log_format: String,
}

impl ManagerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = PathBuf::from(get(ENV_DATA_DIR).ok_or(ConfigError::MissingVariable(ENV_DATA_DIR))?);
        if !data_dir.is_dir() {
            return Err(ConfigError::DataDirUnavailable(data_dir));
        }

        let mut backend = BackendCommand::default();
        if let Some(program) = get(ENV_BACKEND) {
            backend.program = program;
        }

        let listen_raw = get(ENV_LISTEN).unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = listen_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                name: ENV_LISTEN,
                value: listen_raw.clone(),
                reason: e.to_string(),
            })?;

        let max_upload_mb = match get(ENV_MAX_UPLOAD_MB) {
            Some(raw) => parse_megabytes(&raw)?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };
        let max_upload_bytes = usize::try_from(max_upload_mb.saturating_mul(MEGABYTE))
            .map_err(|e| ConfigError::InvalidValue {
                name: ENV_MAX_UPLOAD_MB,
                value: max_upload_mb.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            data_dir,
            backend,
            listen,
            max_upload_bytes,
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
            log_format: get(ENV_LOG_FORMAT).unwrap_or_else(|| "text".to_string()),
        })
    }
}

fn parse_megabytes(raw: &str) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name: ENV_MAX_UPLOAD_MB,
        value: raw.to_string(),
        reason,
    };
    let mb = raw.trim().parse::<u64>().map_err(|e| invalid(e.to_string()))?;
    if mb == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(mb)
}
