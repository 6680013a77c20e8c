use std::path::PathBuf;
use std::pin::Pin;

use apsim_model::{InputFile, InstanceInfo};
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::ApiError;

/// Upload body as it arrives from the transport.
pub type UploadStream<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// Server manager API handler.
///
/// Abstracts the backend so transports can be tested without spawning
/// processes, and so callers can wrap the manager with extra policy.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Store a new primary input and swap the backend onto it.
    async fn deploy_input(&self, upload: UploadStream<'_>) -> Result<InputFile, ApiError>;

    /// Store a side file under `name`.
    async fn upload_auxiliary(&self, name: &str, upload: UploadStream<'_>) -> Result<PathBuf, ApiError>;

    /// Current backend, if any.
    async fn status(&self) -> Result<Option<InstanceInfo>, ApiError>;
}
