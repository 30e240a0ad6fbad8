//! Operation waiting
//!
//! Every mutating call returns an [`Operation`] handle. The waiter polls it
//! with exponential backoff until it is done, the deadline passes or the
//! pass is cancelled.

use crate::api::{Operation, OperationPoller, OperationResult};
use crate::error::WaitError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Backoff between operation polls
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the second poll
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 1.5,
        }
    }
}

impl PollConfig {
    /// Delay after the `attempt`-th unsuccessful poll (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Waits for an operation to reach a terminal state
#[async_trait]
pub trait OperationWaiter: Send + Sync {
    /// Returns the completed operation, or why it did not complete successfully.
    ///
    /// A failure whose status is NOT_FOUND is reported as
    /// [`WaitError::NotFound`] so callers can tell it apart.
    async fn wait(
        &self,
        operation: Operation,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Operation, WaitError>;
}

/// Waiter that polls through an [`OperationPoller`]
pub struct PollingWaiter {
    poller: Arc<dyn OperationPoller>,
    config: PollConfig,
}

impl PollingWaiter {
    pub fn new(poller: Arc<dyn OperationPoller>) -> Self {
        Self {
            poller,
            config: PollConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl OperationWaiter for PollingWaiter {
    async fn wait(
        &self,
        operation: Operation,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Operation, WaitError> {
        let started = Instant::now();
        let mut current = operation;
        let mut attempt: u32 = 0;

        loop {
            if current.done {
                return settle(current);
            }

            if attempt > 0 {
                let wake = (Instant::now() + self.config.delay_for_attempt(attempt - 1)).min(deadline);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                    _ = tokio::time::sleep_until(wake) => {}
                }
            }

            if Instant::now() >= deadline {
                return Err(WaitError::Timeout {
                    elapsed: started.elapsed(),
                });
            }

            tracing::debug!(operation_id = %current.id, attempt, "Polling operation");
            let polled = tokio::select! {
                _ = cancel.cancelled() => return Err(WaitError::Cancelled),
                polled = tokio::time::timeout_at(deadline, self.poller.get_operation(&current.id)) => polled,
            };

            current = match polled {
                Ok(Ok(operation)) => operation,
                Ok(Err(status)) if status.is_not_found() => return Err(WaitError::NotFound(status)),
                Ok(Err(status)) => return Err(WaitError::Poll(status)),
                Err(_) => {
                    return Err(WaitError::Timeout {
                        elapsed: started.elapsed(),
                    });
                }
            };
            attempt = attempt.saturating_add(1);
        }
    }
}

fn settle(operation: Operation) -> Result<Operation, WaitError> {
    match &operation.result {
        Some(OperationResult::Failure(status)) if status.is_not_found() => {
            Err(WaitError::NotFound(status.clone()))
        }
        Some(OperationResult::Failure(status)) => Err(WaitError::Failed(status.clone())),
        Some(OperationResult::Success) | None => Ok(operation),
    }
}
