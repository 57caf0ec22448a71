//! Scoped background token renewal
//!
//! Long operations (chunked uploads, server-side copies) can outlive an
//! access token. A [`TokenRenewer`] runs the adapter's renew action on an
//! interval, but only while at least one [`RenewGuard`] is alive: the first
//! guard starts the background task, dropping the last one stops it. Guards
//! drop on every exit path, errors included.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

type RenewFn = dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync;

struct Inner {
    name: String,
    interval: Duration,
    renew: Box<RenewFn>,
    state: Mutex<RenewState>,
}

#[derive(Default)]
struct RenewState {
    holders: usize,
    running: Option<CancellationToken>,
}

/// Periodic renewal that runs only while guards are held
#[derive(Clone)]
pub struct TokenRenewer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenRenewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRenewer")
            .field("name", &self.inner.name)
            .field("interval", &self.inner.interval)
            .field("holders", &self.inner.state.lock().holders)
            .finish()
    }
}

impl TokenRenewer {
    /// Creates a stopped renewer calling `renew` every `interval`
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, renew: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let renew: Box<RenewFn> = Box::new(move || Box::pin(renew()));
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                interval,
                renew,
                state: Mutex::new(RenewState::default()),
            }),
        }
    }

    /// Takes a guard, starting the background task if none was running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> RenewGuard {
        let mut state = self.inner.state.lock();
        state.holders += 1;
        if state.running.is_none() {
            let token = CancellationToken::new();
            state.running = Some(token.clone());
            debug!(renewer = %self.inner.name, "Starting token renewal");
            tokio::spawn(run(Arc::clone(&self.inner), token));
        }
        RenewGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// True while at least one guard is alive
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().holders > 0
    }
}

/// Keeps renewal running until dropped
#[must_use = "renewal stops as soon as the guard is dropped"]
pub struct RenewGuard {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RenewGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewGuard")
            .field("renewer", &self.inner.name)
            .finish()
    }
}

impl Drop for RenewGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.holders = state.holders.saturating_sub(1);
        if state.holders == 0 {
            if let Some(token) = state.running.take() {
                debug!(renewer = %self.inner.name, "Stopping token renewal");
                token.cancel();
            }
        }
    }
}

async fn run(inner: Arc<Inner>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(inner.interval) => {
                debug!(renewer = %inner.name, "Renewing token");
                if let Err(err) = (inner.renew)().await {
                    warn!(renewer = %inner.name, error = %err, "Token renewal failed");
                }
            }
        }
    }
}
