//! Query execution from submission to aggregated results.
//!
//! Submits an execution, polls it to a terminal state and, when it completed,
//! drains its result pages. Nothing is retried: a rejected submission or an
//! unsuccessful terminal state is returned to the caller.

use crate::api::ExecutionApi;
use crate::error::{DuneError, Result, ResultExt};
use crate::execution::pagination::ResultFormat;
use crate::execution::poller::{PollOptions, StatusPoller};
use crate::types::{ExecutionParams, ExecutionResponse, ExecutionState, QueryId, StatusResponse};

/// Runs queries to completion against an execution API.
pub struct Orchestrator<'a> {
    api: &'a dyn ExecutionApi,
}

impl<'a> Orchestrator<'a> {
    pub fn new(api: &'a dyn ExecutionApi) -> Self {
        Self { api }
    }

    /// Submits a new execution of `query_id`.
    pub async fn submit(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
    ) -> Result<ExecutionResponse> {
        tracing::info!(
            query_id,
            performance = %params.performance,
            parameters = params.query_parameters.as_ref().map_or(0, |p| p.len()),
            "refreshing query https://dune.com/queries/{}",
            query_id
        );
        self.api
            .execute_query(query_id, params)
            .await
            .for_query(query_id)
    }

    /// Submits `query_id` and polls the execution until it reaches a terminal state.
    pub async fn run_until_terminal(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
        options: &PollOptions,
    ) -> Result<StatusResponse> {
        let execution = self.submit(query_id, params).await?;
        StatusPoller::new(self.api, options)
            .poll_until_terminal(&execution.execution_id)
            .await
            .for_query(query_id)
    }

    /// Runs `query_id` and returns all of its results in format `P`.
    ///
    /// Results are only fetched for COMPLETED executions. FAILED and CANCELLED
    /// yield [`DuneError::IncompleteExecution`].
    pub async fn run_to_completion<P: ResultFormat>(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
        options: &PollOptions,
    ) -> Result<P> {
        let status = self.run_until_terminal(query_id, params, options).await?;

        if status.state != ExecutionState::Completed {
            tracing::error!(
                query_id,
                execution_id = %status.execution_id,
                state = %status.state,
                "execution yields incomplete terminal state"
            );
            return Err(DuneError::IncompleteExecution {
                query_id: Some(query_id),
                execution_id: status.execution_id,
                state: status.state,
            });
        }

        tracing::debug!(
            query_id,
            execution_id = %status.execution_id,
            format = P::NAME,
            "fetching results"
        );
        P::fetch_all(self.api, &status.execution_id)
            .await
            .for_query(query_id)
    }
}
