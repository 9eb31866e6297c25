//! Error types for the gateway.
//!
//! Every failure a handler can hit ends up here and is rendered as the uniform
//! `{"error": "<message>"}` envelope. Upstream error statuses are *not* errors:
//! they are forwarded as ordinary replies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("No access token")]
    MissingAccessToken,

    #[error("invalid api key")]
    Unauthorized,

    #[error("Credential error: {message}")]
    Credentials { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request body: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Translation error: {message}")]
    Translation { message: String },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GatewayError {
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation {
            message: msg.into(),
        }
    }

    /// Status code used when this error is surfaced to a client.
    ///
    /// Malformed bodies, missing tokens and transport faults all share 500.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
