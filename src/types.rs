//! Request and response types for the Dune execution API.
//!
//! Defines execution identifiers and states, query parameters, and the JSON
//! and CSV result pages returned by the result endpoints.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DuneError, Result};

/// Largest page the result endpoints will serve in one response.
pub const MAX_ROWS_PER_BATCH: u32 = 32_000;

/// Identifier of a remote query.
pub type QueryId = u64;

/// A single result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Opaque identifier of a submitted execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Wraps a server-issued execution id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    #[serde(rename = "QUERY_STATE_PENDING")]
    Pending,
    #[serde(rename = "QUERY_STATE_EXECUTING")]
    Running,
    #[serde(rename = "QUERY_STATE_COMPLETED")]
    Completed,
    #[serde(rename = "QUERY_STATE_FAILED")]
    Failed,
    #[serde(rename = "QUERY_STATE_CANCELLED")]
    Cancelled,
    /// Results of a completed execution were evicted. Not treated as terminal.
    #[serde(rename = "QUERY_STATE_EXPIRED")]
    Expired,
}

/// States after which an execution never transitions again.
pub const TERMINAL_STATES: [ExecutionState; 3] = [
    ExecutionState::Cancelled,
    ExecutionState::Completed,
    ExecutionState::Failed,
];

impl ExecutionState {
    /// Returns true if the poller should stop on this state.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATES.contains(self)
    }

    /// Returns the wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "QUERY_STATE_PENDING",
            Self::Running => "QUERY_STATE_EXECUTING",
            Self::Completed => "QUERY_STATE_COMPLETED",
            Self::Failed => "QUERY_STATE_FAILED",
            Self::Cancelled => "QUERY_STATE_CANCELLED",
            Self::Expired => "QUERY_STATE_EXPIRED",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choice of execution engine when executing a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    #[default]
    Medium,
    Large,
}

impl Performance {
    /// Returns the tier as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl FromStr for Performance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            _ => Err(format!("Unknown performance tier: {s}. Expected: medium or large")),
        }
    }
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a parameter value is interpreted by the query editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Text,
    Number,
    Datetime,
    Enum,
}

/// A named query parameter. Values always travel as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
}

impl QueryParameter {
    /// Creates a text parameter.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ParameterKind::Text,
        }
    }

    /// Creates a number parameter.
    pub fn number(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
            kind: ParameterKind::Number,
        }
    }

    /// Creates a datetime parameter, formatted as `YYYY-MM-DD HH:MM:SS`.
    pub fn datetime(name: impl Into<String>, value: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            value: value.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: ParameterKind::Datetime,
        }
    }

    /// Creates an enum (list) parameter.
    pub fn enumeration(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ParameterKind::Enum,
        }
    }
}

/// Ordered set of query parameters with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParameters(Vec<QueryParameter>);

impl QueryParameters {
    /// Builds a parameter set, rejecting duplicate names.
    pub fn new(params: Vec<QueryParameter>) -> Result<Self> {
        let mut seen = HashSet::new();
        for param in &params {
            if !seen.insert(param.name.as_str()) {
                return Err(DuneError::invalid_parameters(format!(
                    "duplicate parameter name '{}'",
                    param.name
                )));
            }
        }
        Ok(Self(params))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParameter> {
        self.0.iter()
    }

    /// Returns the `{name: value}` object sent in execute request bodies.
    pub fn to_body(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|p| (p.name.clone(), serde_json::Value::String(p.value.clone())))
            .collect()
    }

    /// Returns the `params.<name>=value` pairs used on GET requests.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|p| (format!("params.{}", p.name), p.value.clone()))
            .collect()
    }
}

/// Optional settings for a query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionParams {
    pub query_parameters: Option<QueryParameters>,
    pub performance: Performance,
}

impl ExecutionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query parameters.
    pub fn with_parameters(mut self, params: QueryParameters) -> Self {
        self.query_parameters = Some(params);
        self
    }

    /// Sets the performance tier.
    pub fn with_performance(mut self, performance: Performance) -> Self {
        self.performance = performance;
        self
    }
}

/// Paging and filtering options for the result endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPageParams {
    pub limit: Option<u32>,
    pub offset: Option<u64>,
    pub query_parameters: Option<QueryParameters>,
}

impl Default for ResultsPageParams {
    fn default() -> Self {
        Self {
            limit: Some(MAX_ROWS_PER_BATCH),
            offset: None,
            query_parameters: None,
        }
    }
}

impl ResultsPageParams {
    /// Default paging, filtered to results produced by `params`.
    pub fn for_parameters(params: Option<&QueryParameters>) -> Self {
        Self {
            query_parameters: params.cloned(),
            ..Self::default()
        }
    }

    /// Returns the query string pairs for this request.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(params) = &self.query_parameters {
            pairs.extend(params.to_query_pairs());
        }
        pairs
    }
}

/// Response to an execute request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution_id: ExecutionId,
    pub state: ExecutionState,
}

/// Response to a status request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub execution_id: ExecutionId,
    pub query_id: QueryId,
    pub state: ExecutionState,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Column and size information about a result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultMetadata {
    pub column_names: Vec<String>,
    pub row_count: u64,
    pub result_set_bytes: u64,
    pub total_row_count: u64,
    pub datapoint_count: u64,
    pub pending_time_millis: Option<u64>,
    pub execution_time_millis: Option<u64>,
}

/// Rows and metadata carried by a JSON result page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub metadata: Option<ResultMetadata>,
}

/// A JSON result page, or the aggregate of all pages once drained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub execution_id: ExecutionId,
    pub query_id: QueryId,
    pub state: ExecutionState,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: ExecutionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
}

impl ResultsResponse {
    pub fn rows(&self) -> &[Row] {
        &self.result.rows
    }

    pub fn row_count(&self) -> usize {
        self.result.rows.len()
    }

    pub fn metadata(&self) -> Option<&ResultMetadata> {
        self.result.metadata.as_ref()
    }
}

/// A CSV result page, or the aggregate of all pages once drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvResponse {
    pub data: String,
    pub next_uri: Option<String>,
    pub next_offset: Option<u64>,
}
