use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Coarse error codes surfaced to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CategoryNotFound,
    CategoryFetchError,
    CategoryCreateError,
    CategoryValidationError,

    SessionNotFound,
    SessionFetchError,
    SessionCreateError,
    SessionUpdateError,
    SessionDeleteError,
    SessionValidationError,

    MessageNotFound,
    MessageFetchError,
    MessageCreateError,
    MessageUpdateError,
    MessageValidationError,
    MessageUnauthorized,

    ProfileFetchError,
    ProfileUpdateError,
    StorageError,

    InvalidRequest,
    Unauthorized,
    Forbidden,
    InternalError,
}

impl ErrorCode {
    /// Message used when the caller has nothing more specific to say
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::CategoryNotFound => "The requested category was not found",
            Self::CategoryFetchError => "Failed to fetch categories",
            Self::CategoryCreateError => "Failed to create category",
            Self::CategoryValidationError => "Category data validation failed",
            Self::SessionNotFound => "The requested session was not found",
            Self::SessionFetchError => "Failed to fetch sessions",
            Self::SessionCreateError => "Failed to create session",
            Self::SessionUpdateError => "Failed to update session",
            Self::SessionDeleteError => "Failed to delete session",
            Self::SessionValidationError => "Session data validation failed",
            Self::MessageNotFound => "The requested message was not found",
            Self::MessageFetchError => "Failed to fetch messages",
            Self::MessageCreateError => "Failed to create message",
            Self::MessageUpdateError => "Failed to update message",
            Self::MessageValidationError => "Message data validation failed",
            Self::MessageUnauthorized => "You are not authorized to access this message",
            Self::ProfileFetchError => "Failed to load profile",
            Self::ProfileUpdateError => "Failed to update profile",
            Self::StorageError => "Failed to create signed upload URL",
            Self::InvalidRequest => "The request contains invalid data",
            Self::Unauthorized => "Authentication required",
            Self::Forbidden => "You do not have permission to perform this action",
            Self::InternalError => "An internal error occurred",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the serde name so logs and responses agree
        match serde_json::to_value(self) {
            Ok(Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{:?}", self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            error: ErrorDetail {
                code,
                message: message.into(),
                details,
            },
        }
    }
}
