//! Execution status polling.
//!
//! Repeatedly checks an execution's status until it reaches a terminal state.
//! Waiting is a `tokio::time::sleep`, so a polling task never blocks a worker
//! thread.

use std::future::pending;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::ExecutionApi;
use crate::config::POLL_FREQUENCY_SECONDS;
use crate::error::{DuneError, Result, ResultExt};
use crate::types::{ExecutionId, ExecutionState, StatusResponse};

/// Controls how often and for how long an execution is polled.
///
/// Without a deadline or cancellation token polling only stops once the
/// execution reaches a terminal state, or when the polling future is dropped.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Wait between two status checks.
    pub interval: Duration,
    /// Give up after this long.
    pub deadline: Option<Duration>,
    /// Stop as soon as this token is cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::every(Duration::from_secs(POLL_FREQUENCY_SECONDS))
    }
}

impl PollOptions {
    /// Polls every `interval`, with no deadline.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            cancel: None,
        }
    }

    /// Polls every `secs` seconds, with no deadline.
    pub fn every_secs(secs: u64) -> Self {
        Self::every(Duration::from_secs(secs))
    }

    /// Fails with [`DuneError::PollTimeout`] once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fails with [`DuneError::Aborted`] when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Polls one execution until it reaches a terminal state.
pub struct StatusPoller<'a> {
    api: &'a dyn ExecutionApi,
    options: &'a PollOptions,
}

impl<'a> StatusPoller<'a> {
    pub fn new(api: &'a dyn ExecutionApi, options: &'a PollOptions) -> Self {
        Self { api, options }
    }

    /// Returns the first status whose state is terminal.
    ///
    /// Success and failure are not interpreted here; FAILED and CANCELLED are
    /// returned the same way COMPLETED is. EXPIRED is not terminal.
    pub async fn poll_until_terminal(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let started = Instant::now();

        let cancelled = async {
            match &self.options.cancel {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };
        let timed_out = async {
            match self.options.deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            status = self.poll_loop(execution_id) => status,
            _ = cancelled => {
                tracing::warn!(execution_id = %execution_id, "polling aborted by caller");
                Err(DuneError::Aborted {
                    query_id: None,
                    execution_id: execution_id.clone(),
                })
            }
            _ = timed_out => {
                let waited = started.elapsed();
                tracing::warn!(execution_id = %execution_id, ?waited, "polling deadline reached");
                Err(DuneError::PollTimeout {
                    query_id: None,
                    execution_id: execution_id.clone(),
                    waited,
                })
            }
        }
    }

    async fn poll_loop(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let mut status = self.check(execution_id).await?;

        while !status.state.is_terminal() {
            if status.state == ExecutionState::Expired {
                tracing::warn!(
                    execution_id = %execution_id,
                    "execution reported EXPIRED, which is not terminal; still polling"
                );
            }
            tracing::info!(
                execution_id = %execution_id,
                state = %status.state,
                queue_position = ?status.queue_position,
                "waiting for query execution to complete"
            );
            tokio::time::sleep(self.options.interval).await;
            status = self.check(execution_id).await?;
        }

        Ok(status)
    }

    async fn check(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        self.api
            .get_execution_status(execution_id)
            .await
            .context(format!("status of execution {execution_id}"))
    }
}
