//! Error types for the relay.
//!
//! Internally every failure keeps its cause. Over HTTP they collapse into two
//! answers: a 400 for requests we refuse, a generic 500 for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Body returned for requests missing `model` or `messages`.
pub const INVALID_REQUEST_BODY: &str = "Invalid request!";

/// Body returned for every upstream-side failure.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Credentials error: {message}")]
    Credentials { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Upstream network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Upstream response could not be decoded: {message}")]
    Decode { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials {
            message: msg.into(),
        }
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Short machine-readable tag for the cause, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Config { .. } => "config",
            Self::Credentials { .. } => "credentials",
            Self::Signing { .. } => "signing",
            Self::Network(_) => "network",
            Self::Service { .. } => "service",
            Self::Decode { .. } => "decode",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Toml(_) => "toml",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRequest { .. } => {
                (StatusCode::BAD_REQUEST, Json(INVALID_REQUEST_BODY)).into_response()
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": INTERNAL_ERROR_BODY })),
            )
                .into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
