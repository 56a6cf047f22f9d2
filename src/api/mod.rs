//! Execution API collaborators.
//!
//! Provides the trait the execution core talks to, an HTTP implementation
//! against the Dune REST API, and a scripted in-memory implementation for tests.

pub mod http;
pub mod mock;

pub use http::HttpExecutionApi;
pub use mock::{ApiCall, ScriptedExecutionApi};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CsvResponse, ExecutionId, ExecutionParams, ExecutionResponse, QueryId, ResultsPageParams,
    ResultsResponse, StatusResponse,
};

/// Request/response operations of the remote execution service.
///
/// Each method is a single round trip with no retry. Implementations must be
/// thread-safe (Send + Sync) so clients can be shared across tasks.
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    /// Submits a new execution of `query_id`.
    async fn execute_query(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
    ) -> Result<ExecutionResponse>;

    /// Fetches the current state of an execution.
    async fn get_execution_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse>;

    /// Fetches the first JSON page of an execution's results.
    async fn get_execution_results(
        &self,
        execution_id: &ExecutionId,
        params: &ResultsPageParams,
    ) -> Result<ResultsResponse>;

    /// Fetches the first CSV page of an execution's results.
    async fn get_execution_results_csv(
        &self,
        execution_id: &ExecutionId,
        params: &ResultsPageParams,
    ) -> Result<CsvResponse>;

    /// Fetches the first JSON page of the latest results of `query_id`.
    async fn get_latest_results(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<ResultsResponse>;

    /// Fetches the first CSV page of the latest results of `query_id`.
    async fn get_latest_results_csv(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<CsvResponse>;

    /// Fetches a JSON continuation page by its server-issued URL.
    async fn get_results_page(&self, next_uri: &str) -> Result<ResultsResponse>;

    /// Fetches a CSV continuation page by its server-issued URL.
    async fn get_csv_page(&self, next_uri: &str) -> Result<CsvResponse>;

    /// Requests cancellation of a running execution.
    async fn cancel_execution(&self, execution_id: &ExecutionId) -> Result<bool>;
}
