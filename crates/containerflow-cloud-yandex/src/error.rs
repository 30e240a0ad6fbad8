//! Yandex client error types

use containerflow_cloud::{Status, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YandexError {
    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, YandexError>;

impl From<YandexError> for Status {
    fn from(err: YandexError) -> Self {
        let code = match &err {
            YandexError::Http(e) if e.is_timeout() => StatusCode::DeadlineExceeded,
            YandexError::Http(e) if e.is_connect() => StatusCode::Unavailable,
            YandexError::Http(e) if e.is_decode() => StatusCode::Internal,
            YandexError::Http(_) => StatusCode::Unknown,
            YandexError::Json(_) => StatusCode::Internal,
            YandexError::MissingEnvVar(_) => StatusCode::Unauthenticated,
            YandexError::InvalidEndpoint { .. } => StatusCode::InvalidArgument,
        };
        Status::new(code, err.to_string())
    }
}
