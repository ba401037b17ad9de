use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::validation::ValidationErrors;

/// Storage-level failure. Messages never carry raw driver text.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Failed to find {0}")]
    Find(&'static str),
    #[error("Failed to create {0}")]
    Create(&'static str),
    #[error("Failed to update {0}")]
    Update(&'static str),
    #[error("Failed to delete {0}")]
    Delete(&'static str),
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
}

/// Outcome kinds a service method can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Access denied")]
    AccessDenied,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::AccessDenied => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Surfaces the first field error to the caller; the full list goes to the log.
pub fn invalid(errors: ValidationErrors) -> ServiceError {
    debug!(errors = ?errors.messages(), "validation failed");
    ServiceError::Validation(errors.first_message().to_string())
}

/// Logs the underlying failure and replaces it with a fixed message.
pub fn internal(err: impl std::fmt::Debug + std::fmt::Display, message: &str) -> ServiceError {
    error!(error = %err, detail = ?err, "{}", message);
    ServiceError::Internal(message.to_string())
}

/// Uniform `{success, data | error}` envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

/// Turns a service result into an HTTP response with `status` on success.
pub fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(data) => (status, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => e.into_response(),
    }
}
