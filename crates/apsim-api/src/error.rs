use apsim_core::{CoreError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidRequest(_) | ApiError::Core(CoreError::Store(StoreError::InvalidFileName(_)))
        )
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let message = apsim_core::aggregate_message(&self);
        let status = if self.is_client_error() {
            tracing::debug!(error = %message, "request rejected");
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, message).into_response()
    }
}
