use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use shared::{ErrorBody, ErrorCode};
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid bearer token (401)
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// Malformed request (400)
    #[error("{message}")]
    BadRequest {
        code: ErrorCode,
        message: String,
        details: Option<Value>,
    },

    /// Well-formed but unacceptable payload (422)
    #[error("{message}")]
    Unprocessable {
        message: String,
        details: Option<Value>,
    },

    #[error("{}", .0.default_message())]
    NotFound(ErrorCode),

    #[error("{}", .0.default_message())]
    Forbidden(ErrorCode),

    /// Store or upstream failure (500, logged)
    #[error("{code}: {source}")]
    Service {
        code: ErrorCode,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn invalid(code: ErrorCode, message: &str, err: ValidationError) -> Self {
        Self::BadRequest {
            code,
            message: message.to_string(),
            details: Some(err.details()),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: ErrorCode::InvalidRequest,
            message: message.into(),
            details: None,
        }
    }

    pub fn service(code: ErrorCode, source: impl Into<anyhow::Error>) -> Self {
        Self::Service {
            code,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Service { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthError(_) => ErrorCode::Unauthorized,
            Self::BadRequest { code, .. } => *code,
            Self::Unprocessable { .. } => ErrorCode::InvalidRequest,
            Self::NotFound(code) | Self::Forbidden(code) => *code,
            Self::Service { code, .. } => *code,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            Self::AuthError(reason) => {
                tracing::debug!("Rejected credentials: {}", reason);
                ErrorBody::new(code, code.default_message(), None)
            }
            Self::BadRequest { message, details, .. }
            | Self::Unprocessable { message, details } => ErrorBody::new(code, message, details),
            Self::NotFound(_) | Self::Forbidden(_) => {
                ErrorBody::new(code, code.default_message(), None)
            }
            Self::Service { source, .. } => {
                // Log the actual error, return generic message
                tracing::error!("{}: {:#}", code, source);
                ErrorBody::new(code, code.default_message(), None)
            }
        };

        (status, Json(body)).into_response()
    }
}
