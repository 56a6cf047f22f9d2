//! Scripted execution API for testing.
//!
//! Replays canned responses in order and records every call it receives.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::ExecutionApi;
use crate::error::{DuneError, Result};
use crate::types::{
    CsvResponse, ExecutionId, ExecutionParams, ExecutionResponse, ExecutionResult,
    ExecutionState, QueryId, ResultMetadata, ResultsPageParams, ResultsResponse, Row,
    StatusResponse,
};

/// A request received by [`ScriptedExecutionApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Execute {
        query_id: QueryId,
        params: ExecutionParams,
    },
    Status(ExecutionId),
    Results(ExecutionId),
    ResultsCsv(ExecutionId),
    Latest {
        query_id: QueryId,
        params: ResultsPageParams,
    },
    LatestCsv {
        query_id: QueryId,
        params: ResultsPageParams,
    },
    Page(String),
    CsvPage(String),
    Cancel(ExecutionId),
}

impl ApiCall {
    /// Returns true for calls that fetch result data.
    pub fn is_result_fetch(&self) -> bool {
        matches!(
            self,
            Self::Results(_)
                | Self::ResultsCsv(_)
                | Self::Latest { .. }
                | Self::LatestCsv { .. }
                | Self::Page(_)
                | Self::CsvPage(_)
        )
    }
}

#[derive(Default)]
struct Script {
    query_id: QueryId,
    executions: VecDeque<Result<ExecutionResponse>>,
    statuses: VecDeque<ExecutionState>,
    results: VecDeque<ResultsResponse>,
    results_csv: VecDeque<CsvResponse>,
    latest: VecDeque<ResultsResponse>,
    latest_csv: VecDeque<CsvResponse>,
    pages: HashMap<String, ResultsResponse>,
    csv_pages: HashMap<String, CsvResponse>,
    cancel_result: bool,
    calls: Vec<ApiCall>,
}

/// Execution API double that replays scripted responses.
///
/// Each endpoint pops the next scripted response; an exhausted script yields a
/// transport error. The last scripted status repeats forever, which models a
/// job that never leaves that state. Continuation pages are looked up by URI.
#[derive(Default)]
pub struct ScriptedExecutionApi {
    script: Mutex<Script>,
}

impl ScriptedExecutionApi {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread must not hide the script from later assertions.
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the query id reported in status responses.
    pub fn with_query_id(self, query_id: QueryId) -> Self {
        self.with(|s| s.query_id = query_id)
    }

    /// Accepts the next submission with the given execution id.
    pub fn with_execution(self, execution_id: &str) -> Self {
        self.with(|s| {
            s.executions.push_back(Ok(ExecutionResponse {
                execution_id: ExecutionId::new(execution_id),
                state: ExecutionState::Pending,
            }))
        })
    }

    /// Rejects the next submission.
    pub fn with_submission_error(self, msg: &str) -> Self {
        let err = DuneError::submission(msg);
        self.with(|s| s.executions.push_back(Err(err)))
    }

    /// Appends states returned by consecutive status checks.
    pub fn with_statuses(self, states: impl IntoIterator<Item = ExecutionState>) -> Self {
        self.with(|s| s.statuses.extend(states))
    }

    /// Queues a first JSON page for execution results.
    pub fn with_results(self, page: ResultsResponse) -> Self {
        self.with(|s| s.results.push_back(page))
    }

    /// Queues a first CSV page for execution results.
    pub fn with_results_csv(self, page: CsvResponse) -> Self {
        self.with(|s| s.results_csv.push_back(page))
    }

    /// Queues a first JSON page for latest results.
    pub fn with_latest(self, page: ResultsResponse) -> Self {
        self.with(|s| s.latest.push_back(page))
    }

    /// Queues a first CSV page for latest results.
    pub fn with_latest_csv(self, page: CsvResponse) -> Self {
        self.with(|s| s.latest_csv.push_back(page))
    }

    /// Serves `page` at continuation `uri`.
    pub fn with_page(self, uri: &str, page: ResultsResponse) -> Self {
        self.with(|s| {
            s.pages.insert(uri.to_string(), page);
        })
    }

    /// Serves CSV `page` at continuation `uri`.
    pub fn with_csv_page(self, uri: &str, page: CsvResponse) -> Self {
        self.with(|s| {
            s.csv_pages.insert(uri.to_string(), page);
        })
    }

    /// Sets the outcome reported by cancel requests.
    pub fn with_cancel_result(self, success: bool) -> Self {
        self.with(|s| s.cancel_result = success)
    }

    /// Returns every call received so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Counts received calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&ApiCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: ApiCall) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.lock();
        script.calls.push(call);
        script
    }

    fn exhausted(what: &str) -> DuneError {
        DuneError::transport(format!("no scripted {what} response"))
    }
}

/// Builds a JSON page of `count` rows `{"n": first..first+count}`.
///
/// Metadata is attached only when `with_metadata` is set, the way the first
/// page of a result carries it.
pub fn numbered_page(
    execution_id: &str,
    first: usize,
    count: usize,
    next_uri: Option<&str>,
    with_metadata: bool,
) -> ResultsResponse {
    let rows: Vec<Row> = (first..first + count)
        .map(|n| {
            let mut row = Row::new();
            row.insert("n".to_string(), serde_json::json!(n));
            row
        })
        .collect();

    let metadata = with_metadata.then(|| ResultMetadata {
        column_names: vec!["n".to_string()],
        row_count: count as u64,
        ..ResultMetadata::default()
    });

    ResultsResponse {
        execution_id: ExecutionId::new(execution_id),
        query_id: 0,
        state: ExecutionState::Completed,
        submitted_at: None,
        expires_at: None,
        execution_started_at: None,
        execution_ended_at: None,
        cancelled_at: None,
        result: ExecutionResult { rows, metadata },
        next_uri: next_uri.map(str::to_string),
        next_offset: next_uri.map(|_| (first + count) as u64),
    }
}

/// Builds a CSV page with an optional continuation.
pub fn csv_page(data: &str, next_uri: Option<&str>) -> CsvResponse {
    CsvResponse {
        data: data.to_string(),
        next_uri: next_uri.map(str::to_string),
        next_offset: None,
    }
}

#[async_trait]
impl ExecutionApi for ScriptedExecutionApi {
    async fn execute_query(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
    ) -> Result<ExecutionResponse> {
        let mut script = self.record(ApiCall::Execute {
            query_id,
            params: params.clone(),
        });
        script
            .executions
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("execute")))
    }

    async fn get_execution_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let mut script = self.record(ApiCall::Status(execution_id.clone()));
        let state = if script.statuses.len() > 1 {
            script.statuses.pop_front()
        } else {
            script.statuses.front().copied()
        }
        .ok_or_else(|| Self::exhausted("status"))?;

        Ok(StatusResponse {
            execution_id: execution_id.clone(),
            query_id: script.query_id,
            state,
            queue_position: None,
            submitted_at: None,
            expires_at: None,
            execution_started_at: None,
            execution_ended_at: None,
            cancelled_at: None,
        })
    }

    async fn get_execution_results(
        &self,
        execution_id: &ExecutionId,
        _params: &ResultsPageParams,
    ) -> Result<ResultsResponse> {
        let mut script = self.record(ApiCall::Results(execution_id.clone()));
        script
            .results
            .pop_front()
            .ok_or_else(|| Self::exhausted("results"))
    }

    async fn get_execution_results_csv(
        &self,
        execution_id: &ExecutionId,
        _params: &ResultsPageParams,
    ) -> Result<CsvResponse> {
        let mut script = self.record(ApiCall::ResultsCsv(execution_id.clone()));
        script
            .results_csv
            .pop_front()
            .ok_or_else(|| Self::exhausted("CSV results"))
    }

    async fn get_latest_results(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<ResultsResponse> {
        let mut script = self.record(ApiCall::Latest {
            query_id,
            params: params.clone(),
        });
        script
            .latest
            .pop_front()
            .ok_or_else(|| Self::exhausted("latest results"))
    }

    async fn get_latest_results_csv(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<CsvResponse> {
        let mut script = self.record(ApiCall::LatestCsv {
            query_id,
            params: params.clone(),
        });
        script
            .latest_csv
            .pop_front()
            .ok_or_else(|| Self::exhausted("latest CSV results"))
    }

    async fn get_results_page(&self, next_uri: &str) -> Result<ResultsResponse> {
        let script = self.record(ApiCall::Page(next_uri.to_string()));
        script
            .pages
            .get(next_uri)
            .cloned()
            .ok_or_else(|| DuneError::transport(format!("no page at {next_uri}")))
    }

    async fn get_csv_page(&self, next_uri: &str) -> Result<CsvResponse> {
        let script = self.record(ApiCall::CsvPage(next_uri.to_string()));
        script
            .csv_pages
            .get(next_uri)
            .cloned()
            .ok_or_else(|| DuneError::transport(format!("no CSV page at {next_uri}")))
    }

    async fn cancel_execution(&self, execution_id: &ExecutionId) -> Result<bool> {
        let script = self.record(ApiCall::Cancel(execution_id.clone()));
        Ok(script.cancel_result)
    }
}
