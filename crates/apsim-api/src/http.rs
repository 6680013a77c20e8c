use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use apsim_model::{InputFile, InstanceInfo};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, multipart::{Field, Multipart, MultipartError}},
    response::IntoResponse,
    routing::{get, post},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::{
    error::ApiError,
    handler::{ApiHandler, UploadStream},
};

/// Multipart form field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "upload";

/// Default request body cap: 30 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 30 << 20;

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    body_limit: usize,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Cap request bodies at `bytes`.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/server/upload - Upload a primary input and restart the backend on it
    /// - POST /api/server/upload-met - Upload an auxiliary file under its own name
    /// - GET /api/server/status - Current backend
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/server/upload", post(upload_input::<H>))
            .route("/api/server/upload-met", post(upload_auxiliary::<H>))
            .route("/api/server/status", get(get_status::<H>))
            .layer(DefaultBodyLimit::max(self.body_limit))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadInputResponse {
    input_file: InputFile,
}

#[derive(Debug, Serialize, Deserialize)]
struct UploadAuxiliaryResponse {
    file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<InstanceInfo>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/server/upload
async fn upload_input<H>(
    State(handler): State<Arc<H>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        debug!(file_name = ?field.file_name(), "receiving primary input");
        let input_file = handler.deploy_input(field_reader(field)).await?;
        return Ok(Json(UploadInputResponse { input_file }));
    }
    Err(missing_field())
}

/// POST /api/server/upload-met
async fn upload_auxiliary<H>(
    State(handler): State<Arc<H>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_owned) else {
            return Err(ApiError::InvalidRequest("uploaded file has no file name".into()));
        };
        debug!(%name, "receiving auxiliary file");
        let file = handler.upload_auxiliary(&name, field_reader(field)).await?;
        return Ok(Json(UploadAuxiliaryResponse { file }));
    }
    Err(missing_field())
}

/// GET /api/server/status
async fn get_status<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let instance = handler.status().await?;
    Ok(Json(StatusResponse { instance }))
}

fn field_reader(field: Field<'_>) -> UploadStream<'_> {
    Box::pin(StreamReader::new(field.map_err(io::Error::other)))
}

fn malformed(e: MultipartError) -> ApiError {
    ApiError::InvalidRequest(format!("malformed multipart body: {}", e.body_text()))
}

fn missing_field() -> ApiError {
    ApiError::InvalidRequest(format!("missing form field '{UPLOAD_FIELD}'"))
}
