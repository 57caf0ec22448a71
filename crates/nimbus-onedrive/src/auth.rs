//! Access-token supply
//!
//! OAuth flows live outside this crate. The backend only needs a way to ask
//! for a fresh access token when the current one expires or while a long
//! operation holds a renew guard; [`TokenSource`] is that capability.
//!
//! Any async closure returning `Result<String, GraphError>` is a
//! `TokenSource`:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nimbus_onedrive::auth::TokenSource;
//! use nimbus_onedrive::GraphClient;
//!
//! let source: Arc<dyn TokenSource> = Arc::new(|| async {
//!     // ... exchange the refresh token ...
//!     Ok::<_, nimbus_onedrive::GraphError>("fresh-access-token".to_string())
//! });
//! let client = GraphClient::new("initial-token").with_token_source(source);
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::GraphError;

/// Supplies fresh OAuth2 access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns a new access token
    async fn fetch_token(&self) -> Result<String, GraphError>;
}

#[async_trait]
impl<F, Fut> TokenSource for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, GraphError>> + Send,
{
    async fn fetch_token(&self) -> Result<String, GraphError> {
        self().await
    }
}
