use std::path::PathBuf;
use std::sync::Arc;

use apsim_core::InstanceManager;
use apsim_model::{InputFile, InstanceInfo};
use async_trait::async_trait;

use crate::error::ApiError;
use crate::handler::{ApiHandler, UploadStream};

/// Adapter that bridges `InstanceManager` to `ApiHandler`.
pub struct ManagerApiAdapter {
    manager: Arc<InstanceManager>,
}

impl ManagerApiAdapter {
    pub fn new(manager: Arc<InstanceManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ApiHandler for ManagerApiAdapter {
    async fn deploy_input(&self, mut upload: UploadStream<'_>) -> Result<InputFile, ApiError> {
        self.manager.deploy(&mut upload).await.map_err(ApiError::from)
    }

    async fn upload_auxiliary(&self, name: &str, mut upload: UploadStream<'_>) -> Result<PathBuf, ApiError> {
        self.manager
            .upload_auxiliary(name, &mut upload)
            .await
            .map_err(ApiError::from)
    }

    async fn status(&self) -> Result<Option<InstanceInfo>, ApiError> {
        Ok(self.manager.status().await)
    }
}
