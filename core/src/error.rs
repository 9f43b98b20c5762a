//! Error types for the Oyster API client.
//!
//! # Design
//! One tagged enum covers every failure a caller can see. `HttpStatus`
//! always carries an `ApiError`: the decoded error body when the server sent
//! one, otherwise a synthetic record holding only the raw status. `Decode`
//! is kept apart from `HttpStatus` so callers can tell "the server said no"
//! from "the server said something we could not read".

use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;

const UNKNOWN_CATEGORY: &str = "Unknown error";
const UNKNOWN_MESSAGE: &str = "An unknown error occurred";

/// Structured error body returned by the backend on any 4xx or 5xx response.
///
/// Wire shape: `{"timestamp", "message", "error", "status"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "error")]
    pub category: String,
    #[serde(rename = "status")]
    pub http_status: u16,
    pub message: String,
    pub timestamp: String,
}

impl ApiError {
    /// Fallback used when an error body is missing or unreadable.
    pub fn synthetic(status: u16) -> Self {
        Self {
            category: UNKNOWN_CATEGORY.to_string(),
            http_status: status,
            message: UNKNOWN_MESSAGE.to_string(),
            timestamp: String::new(),
        }
    }
}

/// Errors returned by `OysterClient` build and parse methods.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The exchange never produced a response (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// Rejected before any network attempt.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server answered with a status of 400 or above.
    #[error("HTTP {status}: {}", .error.message)]
    HttpStatus {
        status: u16,
        error: ApiError,
        /// `false` when `error` is synthetic.
        decoded: bool,
    },

    /// A non-error body that does not match the expected type.
    #[error("failed to decode response: {message}")]
    Decode { message: String, body: String },
}

impl ClientError {
    /// HTTP status of the response, if there was one with a failing status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for showing to a user.
    pub fn message(&self) -> String {
        match self {
            ClientError::HttpStatus { error, .. } => error.message.clone(),
            ClientError::Transport(msg) | ClientError::InvalidRequest(msg) => msg.clone(),
            ClientError::Decode { message, .. } => message.clone(),
        }
    }

    /// The backend's error record, decoded or synthetic.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::HttpStatus { error, .. } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ClientError::InvalidRequest(msg.into())
    }

    /// Build the error for a 4xx or 5xx response, decoding its body when possible.
    pub fn from_response(response: &HttpResponse) -> Self {
        match serde_json::from_str::<ApiError>(&response.body) {
            Ok(error) => ClientError::HttpStatus {
                status: response.status,
                error,
                decoded: true,
            },
            Err(_) => ClientError::HttpStatus {
                status: response.status,
                error: ApiError::synthetic(response.status),
                decoded: false,
            },
        }
    }
}
