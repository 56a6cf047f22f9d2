//! High-level Dune client.
//!
//! Wraps an [`ExecutionApi`] with the run/poll/paginate/refresh workflows.

use std::sync::Arc;

use crate::api::{ExecutionApi, HttpExecutionApi};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::execution::{FreshnessFetcher, Orchestrator, PollOptions, ResultFormat};
use crate::types::{
    CsvResponse, ExecutionId, ExecutionParams, ExecutionResponse, QueryId, QueryParameters,
    ResultsResponse, StatusResponse,
};

/// Client for running Dune queries and fetching their results.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct DuneClient {
    api: Arc<dyn ExecutionApi>,
    config: ClientConfig,
}

impl std::fmt::Debug for DuneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuneClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl DuneClient {
    /// Creates an HTTP client from the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = HttpExecutionApi::new(&config)?;
        Ok(Self::with_api(Arc::new(api), config))
    }

    /// Creates an HTTP client with an API key and default settings.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::new(api_key))
    }

    /// Creates a client from `DUNE_API_KEY` and `DUNE_API_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::default();
        config.apply_env_defaults();
        Self::new(config)
    }

    /// Creates a client over any execution API implementation.
    pub fn with_api(api: Arc<dyn ExecutionApi>, config: ClientConfig) -> Self {
        Self { api, config }
    }

    /// Returns the underlying execution API.
    pub fn api(&self) -> &dyn ExecutionApi {
        self.api.as_ref()
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Poll options built from the configured ping frequency.
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::every_secs(self.config.poll_frequency_secs)
    }

    fn execution_params(&self, params: Option<QueryParameters>) -> ExecutionParams {
        ExecutionParams {
            query_parameters: params,
            performance: self.config.performance,
        }
    }

    /// Runs `query_id` and returns all JSON result rows.
    pub async fn run_query(
        &self,
        query_id: QueryId,
        params: Option<QueryParameters>,
    ) -> Result<ResultsResponse> {
        self.run_query_with(query_id, &self.execution_params(params), &self.poll_options())
            .await
    }

    /// Runs `query_id` and returns all results as CSV text.
    pub async fn run_query_csv(
        &self,
        query_id: QueryId,
        params: Option<QueryParameters>,
    ) -> Result<String> {
        let csv: CsvResponse = self
            .run_query_with(query_id, &self.execution_params(params), &self.poll_options())
            .await?;
        Ok(csv.data)
    }

    /// Runs `query_id` with explicit execution and polling settings.
    pub async fn run_query_with<P: ResultFormat>(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
        options: &PollOptions,
    ) -> Result<P> {
        Orchestrator::new(self.api())
            .run_to_completion(query_id, params, options)
            .await
    }

    /// Returns the latest JSON results, re-running the query if they are
    /// older than `max_age_hours` (default from config).
    pub async fn get_latest_result(
        &self,
        query_id: QueryId,
        params: Option<QueryParameters>,
        max_age_hours: Option<u64>,
    ) -> Result<ResultsResponse> {
        let options = self.poll_options();
        FreshnessFetcher::new(self.api(), &options)
            .get_latest(
                query_id,
                &self.execution_params(params),
                max_age_hours.unwrap_or(self.config.max_age_hours),
            )
            .await
    }

    /// Returns the latest results as CSV text, re-running the query if they
    /// are older than `max_age_hours` (default from config).
    pub async fn get_latest_result_csv(
        &self,
        query_id: QueryId,
        params: Option<QueryParameters>,
        max_age_hours: Option<u64>,
    ) -> Result<String> {
        let options = self.poll_options();
        let csv = FreshnessFetcher::new(self.api(), &options)
            .get_latest_csv(
                query_id,
                &self.execution_params(params),
                max_age_hours.unwrap_or(self.config.max_age_hours),
            )
            .await?;
        Ok(csv.data)
    }

    /// Submits an execution without waiting for it.
    pub async fn execute_query(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
    ) -> Result<ExecutionResponse> {
        Orchestrator::new(self.api()).submit(query_id, params).await
    }

    /// Fetches the current status of an execution.
    pub async fn get_execution_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        self.api.get_execution_status(execution_id).await
    }

    /// Fetches all JSON results of an execution.
    pub async fn get_execution_results(&self, execution_id: &ExecutionId) -> Result<ResultsResponse> {
        ResultsResponse::fetch_all(self.api(), execution_id).await
    }

    /// Fetches all results of an execution as CSV text.
    pub async fn get_execution_results_csv(&self, execution_id: &ExecutionId) -> Result<String> {
        let csv = CsvResponse::fetch_all(self.api(), execution_id).await?;
        Ok(csv.data)
    }

    /// Requests cancellation of an execution.
    pub async fn cancel_execution(&self, execution_id: &ExecutionId) -> Result<bool> {
        let cancelled = self.api.cancel_execution(execution_id).await?;
        tracing::info!(execution_id = %execution_id, cancelled, "cancel requested");
        Ok(cancelled)
    }
}
