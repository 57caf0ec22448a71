//! Polling of asynchronous server-side jobs
//!
//! Server-side copies answer `202 Accepted` with a `Location` monitor URL.
//! The monitor is pre-authenticated, so it is polled without the bearer
//! token, through the pacer like every other call.

use std::time::Duration;

use nimbus_core::{Error, Result, RetryPacer};
use reqwest::Method;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::AsyncOperationStatus;
use crate::client::{ApiCall, GraphClient};
use crate::{retry, GraphError};

/// Polls `location` until the job completes
///
/// # Errors
/// - `Backend(JobFailed)` if the job reports `failed` or `deleteFailed`
/// - `Timeout` if it has not completed within `timeout`
pub async fn wait_for_job(
    client: &GraphClient,
    pacer: &RetryPacer,
    location: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    match tokio::time::timeout_at(deadline, poll(client, pacer, location, poll_interval)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

async fn poll(
    client: &GraphClient,
    pacer: &RetryPacer,
    location: &str,
    poll_interval: Duration,
) -> Result<()> {
    let call = &ApiCall::absolute(Method::GET, location).unauthenticated();

    loop {
        let status: AsyncOperationStatus = pacer
            .call(|| async move { client.call_json(call).await.map_err(retry::classify) })
            .await?;

        match status.status.as_str() {
            "completed" => {
                info!(location, "Async job completed");
                return Ok(());
            }
            "failed" | "deleteFailed" => {
                return Err(GraphError::JobFailed {
                    status: status.status,
                    message: format!("async operation at {location} did not complete"),
                }
                .into());
            }
            other => {
                debug!(
                    location,
                    status = other,
                    percentage = status.percentage_complete,
                    "Async job still running"
                );
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
