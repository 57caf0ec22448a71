//! Nimbus OneDrive - Microsoft Graph backend
//!
//! Composes the Nimbus core (directory cache, retry pacer, chunked uploads)
//! into a [`RemoteFs`](nimbus_core::ports::RemoteFs) over the OneDrive API.
//!
//! ## Modules
//!
//! - [`api`] - Graph request/response wire types
//! - [`auth`] - The [`TokenSource`](auth::TokenSource) fresh access tokens come from
//! - [`client`] - Authenticated HTTP call primitive
//! - [`retry`] - Retryability classification and `Retry-After` parsing
//! - [`fs`] - [`OneDriveFs`] and its [`Object`]
//! - [`upload`] - Graph upload sessions for the chunked uploader
//! - [`jobs`] - Polling of asynchronous server-side jobs

pub mod api;
pub mod auth;
pub mod client;
pub mod fs;
pub mod jobs;
pub mod retry;
pub mod upload;

use std::time::Duration;

use thiserror::Error;

pub use auth::TokenSource;
pub use client::GraphClient;
pub use fs::{DriveType, Object, OneDriveFs};

/// Errors that can occur when communicating with the Microsoft Graph API
#[derive(Debug, Error)]
pub enum GraphError {
    /// Authentication credentials are invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conflict was detected (e.g. the name is already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Server-requested wait, from `Retry-After`
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error {status}: {message}")]
    ServerError {
        status: u16,
        message: String,
        /// Server-requested wait, from `Retry-After`
        retry_after: Option<Duration>,
    },

    /// Any other non-success status
    #[error("HTTP {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The OAuth2 token has expired and must be refreshed
    #[error("Token expired")]
    TokenExpired,

    /// A server-side job ended without completing
    #[error("Async job {status}: {message}")]
    JobFailed { status: String, message: String },

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A request body could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Server-requested wait before retrying, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GraphError::TooManyRequests { retry_after }
            | GraphError::ServerError { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status behind this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Unauthorized(_) | GraphError::TokenExpired => Some(401),
            GraphError::Forbidden(_) => Some(403),
            GraphError::NotFound(_) => Some(404),
            GraphError::Conflict(_) => Some(409),
            GraphError::TooManyRequests { .. } => Some(429),
            GraphError::ServerError { status, .. } | GraphError::Api { status, .. } => {
                Some(*status)
            }
            GraphError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            GraphError::JobFailed { .. }
            | GraphError::InvalidResponse(_)
            | GraphError::Json(_) => None,
        }
    }
}

impl From<GraphError> for nimbus_core::Error {
    fn from(err: GraphError) -> Self {
        if retry::should_retry(&err) {
            return nimbus_core::Error::Transient(err.to_string());
        }
        match err {
            GraphError::NotFound(message) => nimbus_core::Error::NotFound(message),
            other => nimbus_core::Error::backend(other),
        }
    }
}
