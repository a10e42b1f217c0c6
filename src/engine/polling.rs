//! Status polling after asynchronous operations.

use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Terminal and in-progress statuses plus timing of one polling run
#[derive(Debug, Clone)]
pub struct PollSpec<'a> {
    pub resource: &'a str,
    pub target_statuses: &'a [String],
    pub pending_statuses: &'a [String],
    pub timeout: Duration,
    pub interval: Duration,
}

/// Probes until a target status shows up.
///
/// Each probe returns the currently observed status. A status that is neither
/// pending nor a target fails immediately; cancellation is honoured between probes.
///
/// # Errors
///
/// Returns `Polling` (with the last observed status) on unexpected statuses or
/// timeout, `Cancelled` when the token fires, and any probe error as-is.
pub async fn wait_for_status<F, Fut>(
    spec: &PollSpec<'_>,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<String, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, Error>>,
{
    // An unrepresentable deadline means the operation never times out
    let deadline = Instant::now().checked_add(spec.timeout);

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                resource: spec.resource.to_string(),
            });
        }

        let status = probe().await?;
        debug!("resource '{}' reports status '{status}'", spec.resource);

        if spec.target_statuses.contains(&status) {
            return Ok(status);
        }
        if !spec.pending_statuses.contains(&status) {
            return Err(Error::Polling {
                resource: spec.resource.to_string(),
                reason: format!(
                    "unexpected status; expected one of [{}] or pending [{}]",
                    spec.target_statuses.join(", "),
                    spec.pending_statuses.join(", ")
                ),
                last_status: status,
            });
        }

        let next_probe = Instant::now().checked_add(spec.interval);
        if deadline.is_some_and(|deadline| next_probe.is_none_or(|next| next > deadline)) {
            return Err(Error::Polling {
                resource: spec.resource.to_string(),
                reason: format!("timed out after {:?}", spec.timeout),
                last_status: status,
            });
        }

        tokio::select! {
            () = tokio::time::sleep(spec.interval) => {}
            () = cancel.cancelled() => {
                return Err(Error::Cancelled {
                    resource: spec.resource.to_string(),
                });
            }
        }
    }
}
