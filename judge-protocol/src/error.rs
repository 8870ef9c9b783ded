use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownError = 1000,
    NotSupported = 1001,
    InvalidRequest = 1002,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: Option<String>,
}

/// A request rejected before any judging work starts.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("language \"{0}\" is not supported")]
    UnsupportedLanguage(String),
}

impl RequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::Malformed(_) | RequestError::Invalid(_) => ErrorCode::InvalidRequest,
            RequestError::UnsupportedLanguage(_) => ErrorCode::NotSupported,
        }
    }

    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code(),
            message: Some(self.to_string()),
        }
    }
}
