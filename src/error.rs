use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    Json,
    http::StatusCode,
};
use serde::Serialize;

use crate::provider::ProviderError;

#[derive(Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::Unavailable(_) => "upstream_unavailable",
            AppError::Upstream(_) => "upstream_error",
            AppError::ConfigError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind();
        let message = match self {
            AppError::InvalidRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unavailable(msg)
            | AppError::Upstream(msg)
            | AppError::ConfigError(msg) => msg,
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::NotFound(_) => AppError::NotFound(message),
            ProviderError::RateLimited | ProviderError::Blocked(_) => {
                AppError::Unavailable(message)
            }
            ProviderError::Transport(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Upstream { .. } => AppError::Upstream(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
