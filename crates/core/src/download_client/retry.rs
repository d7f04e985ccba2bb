//! Bounded polling for backends that are only eventually consistent.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Fixed interval and attempt ceiling for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    /// One second between attempts, ten attempts.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 10)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("condition not met after {0} attempts")]
    Exhausted(u32),

    #[error("cancelled by shutdown")]
    Cancelled,

    #[error(transparent)]
    Inner(E),
}

/// Run `check` until it reports `true`, the attempts run out, or shutdown is signalled.
///
/// An error from `check` ends the loop immediately. A dropped shutdown sender
/// never cancels.
pub async fn poll_until<F, Fut, E>(
    policy: RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
    mut check: F,
) -> Result<u32, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for attempt in 1..=policy.max_attempts {
        if *shutdown.borrow() {
            return Err(RetryError::Cancelled);
        }
        if check().await.map_err(RetryError::Inner)? {
            return Ok(attempt);
        }
        if attempt == policy.max_attempts {
            break;
        }

        let stop = async { shutdown.wait_for(|stop| *stop).await.is_ok() };
        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            true = stop => return Err(RetryError::Cancelled),
        }
    }

    Err(RetryError::Exhausted(policy.max_attempts))
}
