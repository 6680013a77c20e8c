mod error;
pub use error::ApiError;

mod handler;
pub use handler::{ApiHandler, UploadStream};

mod adapter;
pub use adapter::ManagerApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpApi, UPLOAD_FIELD};

#[cfg(feature = "http")]
pub use axum;
