//! Per-run cancellation and time budget.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::error::EngineError;

/// Checked at every node boundary, including nodes inside chains and
/// wrapper sub-walks.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: CancellationToken,
    started: Instant,
    budget: Duration,
}

impl RunControl {
    pub fn new(cancel: CancellationToken, budget: Duration) -> Self {
        Self {
            cancel,
            started: Instant::now(),
            budget,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with `Cancelled` or `Timeout` when the run must stop.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.started.elapsed() > self.budget {
            return Err(EngineError::Timeout(self.budget.as_secs()));
        }
        Ok(())
    }

    /// Sleep for `duration` unless the run is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), EngineError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(EngineError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
