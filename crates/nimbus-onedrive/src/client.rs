//! Microsoft Graph API client
//!
//! The single call primitive the backend builds on. A call is described by an
//! [`ApiCall`] (method, drive-relative path or absolute URL, headers, body)
//! and can be executed any number of times, which is what the pacer needs to
//! retry it. Non-2xx responses are turned into [`GraphError`]s, including the
//! `Retry-After` and `WWW-Authenticate` details retry classification relies on.
//!
//! With a [`TokenSource`] attached, a response reporting an expired token
//! makes the client fetch a new one before the error reaches the pacer, so
//! the retried attempt carries the fresh token.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nimbus_onedrive::api::DriveItem;
//! use nimbus_onedrive::client::{ApiCall, GraphClient};
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), nimbus_onedrive::GraphError> {
//! let client = GraphClient::new("access-token-here");
//! let root: DriveItem = client.call_json(&ApiCall::new(Method::GET, "/root")).await?;
//! println!("root id: {}", root.id);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use nimbus_core::config::OneDriveConfig;
use parking_lot::RwLock;
use reqwest::header::{RETRY_AFTER, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ErrorResponse;
use crate::auth::TokenSource;
use crate::retry::parse_retry_after;
use crate::GraphError;

/// Base URL for Microsoft Graph API v1.0
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

// ============================================================================
// ApiCall
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Path appended to the drive URL
    Drive(String),
    /// Full URL (next links, upload sessions, job monitors)
    Absolute(String),
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// A reusable description of one HTTP call
#[derive(Debug, Clone)]
pub struct ApiCall {
    method: Method,
    target: Target,
    headers: Vec<(&'static str, String)>,
    body: Body,
    authenticated: bool,
}

impl ApiCall {
    /// A call to `path`, relative to the drive URL (e.g. `/root`)
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::with_target(method, Target::Drive(path.into()))
    }

    /// A call to an absolute URL
    pub fn absolute(method: Method, url: impl Into<String>) -> Self {
        Self::with_target(method, Target::Absolute(url.into()))
    }

    fn with_target(method: Method, target: Target) -> Self {
        Self {
            method,
            target,
            headers: Vec::new(),
            body: Body::Empty,
            authenticated: true,
        }
    }

    /// Adds a request header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Sends `body` as JSON
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, GraphError> {
        self.body = Body::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Sends raw bytes; `Content-Length` follows from their length
    pub fn bytes(mut self, body: Bytes) -> Self {
        self.body = Body::Bytes(body);
        self
    }

    /// Sends the call without the bearer token (pre-authenticated URLs)
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with authentication headers and URL construction
/// for one drive.
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL of the Graph API
    graph_url: String,
    /// Base URL of the drive, `{graph}/drives/{id}` or `{graph}/me/drive`
    drive_url: String,
    /// Current OAuth2 access token
    access_token: RwLock<String>,
    /// Where fresh tokens come from; without one the token never changes
    token_source: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("graph_url", &self.graph_url)
            .field("drive_url", &self.drive_url)
            .field("token_source", &self.token_source.is_some())
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Creates a client for the signed-in user's default drive
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GRAPH_BASE_URL)
    }

    /// Creates a client with a custom Graph base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, graph_url: impl Into<String>) -> Self {
        let graph_url = graph_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            drive_url: format!("{graph_url}/me/drive"),
            graph_url,
            access_token: RwLock::new(access_token.into()),
            token_source: None,
        }
    }

    /// Creates a client for the Graph URL and drive named in `config`
    pub fn from_config(access_token: impl Into<String>, config: &OneDriveConfig) -> Self {
        let client = Self::with_base_url(access_token, &config.graph_url);
        match &config.drive_id {
            Some(drive_id) => client.with_drive(drive_id),
            None => client,
        }
    }

    /// Targets a specific drive instead of the default one
    pub fn with_drive(mut self, drive_id: &str) -> Self {
        self.drive_url = format!("{}/drives/{drive_id}", self.graph_url);
        self
    }

    /// Refreshes the token from `source` whenever it expires or is renewed
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn has_token_source(&self) -> bool {
        self.token_source.is_some()
    }

    /// Fetches a new token from the token source and installs it
    ///
    /// Returns `false` without doing anything when no source is attached.
    pub async fn refresh_access_token(&self) -> Result<bool, GraphError> {
        let Some(source) = &self.token_source else {
            return Ok(false);
        };
        let token = source.fetch_token().await?;
        self.set_access_token(token);
        info!("Refreshed access token");
        Ok(true)
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write() = token.into();
        debug!("Updated GraphClient access token");
    }

    /// Returns the current access token
    pub fn access_token(&self) -> String {
        self.access_token.read().clone()
    }

    pub fn graph_url(&self) -> &str {
        &self.graph_url
    }

    pub fn drive_url(&self) -> &str {
        &self.drive_url
    }

    /// A call to `route` under the item `id`
    ///
    /// IDs of the form `driveId#itemId` address an item on another drive.
    pub fn item_call(&self, method: Method, id: &str, route: &str) -> ApiCall {
        match id.split_once('#') {
            Some((drive, item)) => ApiCall::absolute(
                method,
                format!("{}/drives/{drive}/items/{item}{route}", self.graph_url),
            ),
            None => ApiCall::new(method, format!("/items/{id}{route}")),
        }
    }

    fn url_for(&self, target: &Target) -> String {
        match target {
            Target::Drive(path) => format!("{}{path}", self.drive_url),
            Target::Absolute(url) => url.clone(),
        }
    }

    /// Sends `call` once, returning the response if its status is 2xx
    pub async fn execute(&self, call: &ApiCall) -> Result<Response, GraphError> {
        let url = self.url_for(&call.target);
        debug!(method = %call.method, url = %url, "Graph call");

        let mut request = self.client.request(call.method.clone(), &url);
        if call.authenticated {
            request = request.bearer_auth(self.access_token.read().as_str());
        }
        for (name, value) in &call.headers {
            request = request.header(*name, value.as_str());
        }
        request = match &call.body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::Bytes(bytes) => request.body(bytes.clone()),
        };

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let err = error_from_response(response).await;
        if matches!(err, GraphError::TokenExpired) && call.authenticated {
            match self.refresh_access_token().await {
                Ok(true) => {}
                // Resending the same token cannot succeed
                Ok(false) => {
                    return Err(GraphError::Unauthorized(
                        "access token expired and no token source is attached".into(),
                    ))
                }
                Err(refresh_err) => {
                    warn!(error = %refresh_err, "Access token expired and refreshing it failed");
                    return Err(refresh_err);
                }
            }
        }
        Err(err)
    }

    /// Sends `call` and decodes the JSON response body
    pub async fn call_json<T: DeserializeOwned>(&self, call: &ApiCall) -> Result<T, GraphError> {
        let response = self.execute(call).await?;
        decode_json(response).await
    }

    /// Sends `call`, discarding any response body
    pub async fn call_no_content(&self, call: &ApiCall) -> Result<(), GraphError> {
        self.execute(call).await.map(drop)
    }
}

/// Decodes a JSON response body
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, GraphError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        GraphError::InvalidResponse(format!(
            "{e}: {}",
            String::from_utf8_lossy(&body[..body.len().min(256)])
        ))
    })
}

/// Turns a non-2xx response into a [`GraphError`]
async fn error_from_response(response: Response) -> GraphError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let token_expired = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("expired_token"));

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) if !err.error.code.is_empty() => (err.error.code, err.error.message),
        _ => (status.to_string(), body),
    };
    let detail = if message.is_empty() {
        code.clone()
    } else {
        format!("{code}: {message}")
    };
    debug!(status = status.as_u16(), code = %code, "Graph call failed");

    match status {
        StatusCode::UNAUTHORIZED if token_expired => GraphError::TokenExpired,
        StatusCode::UNAUTHORIZED => GraphError::Unauthorized(detail),
        StatusCode::FORBIDDEN => GraphError::Forbidden(detail),
        StatusCode::NOT_FOUND => GraphError::NotFound(detail),
        StatusCode::CONFLICT => GraphError::Conflict(detail),
        StatusCode::TOO_MANY_REQUESTS => GraphError::TooManyRequests { retry_after },
        s if s.is_server_error() => GraphError::ServerError {
            status: s.as_u16(),
            message: detail,
            retry_after,
        },
        s => GraphError::Api {
            status: s.as_u16(),
            code,
            message,
        },
    }
}
