use std::{future::Future, time::Duration};

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Cancellation token and deadline shared by every fetch of one run.
///
/// Cloning is cheap; clones observe the same token and the same deadline.
#[derive(Debug, Clone)]
pub struct FetchContext {
    token: CancellationToken,
    deadline: Instant,
}

impl FetchContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Runs `fut` until it finishes, the token is cancelled or the deadline
    /// passes, whichever happens first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(FetchError::Cancelled),
            _ = sleep_until(self.deadline) => Err(FetchError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
