//! HTTP implementation of the execution API.
//!
//! Talks to the Dune REST API (v1) with reqwest.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::api::ExecutionApi;
use crate::config::ClientConfig;
use crate::error::{DuneError, Result};
use crate::types::{
    CsvResponse, ExecutionId, ExecutionParams, ExecutionResponse, QueryId, ResultsPageParams,
    ResultsResponse, StatusResponse,
};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-dune-api-key";

/// Header carrying the absolute URL of the next CSV page.
pub const NEXT_URI_HEADER: &str = "x-dune-next-uri";

/// Header carrying the row offset of the next CSV page.
pub const NEXT_OFFSET_HEADER: &str = "x-dune-next-offset";

/// Execution API client backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpExecutionApi {
    base_url: Url,
    api_key: String,
    client: Client,
}

impl HttpExecutionApi {
    /// Creates a client from the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let base_url = config.parsed_base_url()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DuneError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DuneError::config(format!("Invalid endpoint path '{path}': {e}")))
    }

    /// Parses a server-issued continuation URL. Relative references are rejected.
    fn continuation_url(next_uri: &str) -> Result<Url> {
        Url::parse(next_uri).map_err(|e| {
            DuneError::malformed(format!("continuation '{next_uri}' is not an absolute URL: {e}"))
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DuneError::transport("Request timed out")
                } else if e.is_connect() {
                    DuneError::transport(format!("Failed to connect to Dune API: {}", e))
                } else {
                    DuneError::transport(format!("Request failed: {}", e))
                }
            })
    }

    async fn get(&self, url: Url, query: &[(String, String)]) -> Result<Response> {
        tracing::debug!(%url, params = query.len(), "GET");
        self.send(self.client.get(url).query(query)).await
    }

    async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Response> {
        tracing::debug!(%url, "POST");
        self.send(self.client.post(url).json(body)).await
    }

    /// Reads a JSON body, mapping non-success statuses through `on_error`.
    async fn read_json<T: DeserializeOwned>(
        response: Response,
        on_error: fn(String) -> DuneError,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DuneError::transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(on_error(Self::parse_error(status, &body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            // Some endpoints answer 200 with an error object.
            if let Ok(error_body) = serde_json::from_str::<ErrorBody>(&body) {
                on_error(error_body.message())
            } else {
                DuneError::malformed(format!("Failed to parse response: {}", e))
            }
        })
    }

    /// Reads a CSV body together with its continuation headers.
    async fn read_csv(response: Response) -> Result<CsvResponse> {
        let status = response.status();
        let (next_uri, next_offset) = Self::csv_continuation(response.headers())?;
        let data = response
            .text()
            .await
            .map_err(|e| DuneError::transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(DuneError::transport(Self::parse_error(status, &data)));
        }

        Ok(CsvResponse {
            data,
            next_uri,
            next_offset,
        })
    }

    fn csv_continuation(headers: &HeaderMap) -> Result<(Option<String>, Option<u64>)> {
        let header = |name: &str| -> Result<Option<String>> {
            headers
                .get(name)
                .map(|v| {
                    v.to_str()
                        .map(str::to_string)
                        .map_err(|_| DuneError::malformed(format!("{name} header is not ASCII")))
                })
                .transpose()
        };

        let next_uri = header(NEXT_URI_HEADER)?;
        let next_offset = header(NEXT_OFFSET_HEADER)?
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    DuneError::malformed(format!("{NEXT_OFFSET_HEADER} header '{raw}' is not a number"))
                })
            })
            .transpose()?;

        Ok((next_uri, next_offset))
    }

    /// Builds an error message from a failed response.
    fn parse_error(status: StatusCode, body: &str) -> String {
        if status == StatusCode::UNAUTHORIZED {
            return "Authentication failed. Check your DUNE_API_KEY.".to_string();
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return "Rate limited. Please wait and try again.".to_string();
        }

        if let Ok(error_body) = serde_json::from_str::<ErrorBody>(body) {
            return format!("Dune API error ({}): {}", status, error_body.message());
        }

        format!("Dune API error ({}): {}", status, body)
    }
}

#[async_trait]
impl ExecutionApi for HttpExecutionApi {
    async fn execute_query(
        &self,
        query_id: QueryId,
        params: &ExecutionParams,
    ) -> Result<ExecutionResponse> {
        let request = ExecuteRequest {
            query_parameters: params
                .query_parameters
                .as_ref()
                .map(|p| p.to_body())
                .unwrap_or_default(),
            performance: params.performance.as_str(),
        };
        let url = self.endpoint(&format!("query/{query_id}/execute"))?;
        let response = self.post(url, &request).await?;
        let execution: ExecutionResponse =
            Self::read_json(response, DuneError::Submission).await?;
        tracing::debug!(
            execution_id = %execution.execution_id,
            state = %execution.state,
            "execute response"
        );
        Ok(execution)
    }

    async fn get_execution_status(&self, execution_id: &ExecutionId) -> Result<StatusResponse> {
        let url = self.endpoint(&format!("execution/{execution_id}/status"))?;
        let response = self.get(url, &[]).await?;
        let status: StatusResponse = Self::read_json(response, DuneError::Transport).await?;
        tracing::debug!(execution_id = %execution_id, state = %status.state, "status response");
        Ok(status)
    }

    async fn get_execution_results(
        &self,
        execution_id: &ExecutionId,
        params: &ResultsPageParams,
    ) -> Result<ResultsResponse> {
        let url = self.endpoint(&format!("execution/{execution_id}/results"))?;
        let response = self.get(url, &params.to_query_pairs()).await?;
        Self::read_json(response, DuneError::Transport).await
    }

    async fn get_execution_results_csv(
        &self,
        execution_id: &ExecutionId,
        params: &ResultsPageParams,
    ) -> Result<CsvResponse> {
        let url = self.endpoint(&format!("execution/{execution_id}/results/csv"))?;
        let response = self.get(url, &params.to_query_pairs()).await?;
        Self::read_csv(response).await
    }

    async fn get_latest_results(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<ResultsResponse> {
        let url = self.endpoint(&format!("query/{query_id}/results"))?;
        let response = self.get(url, &params.to_query_pairs()).await?;
        Self::read_json(response, DuneError::Transport).await
    }

    async fn get_latest_results_csv(
        &self,
        query_id: QueryId,
        params: &ResultsPageParams,
    ) -> Result<CsvResponse> {
        let url = self.endpoint(&format!("query/{query_id}/results/csv"))?;
        let response = self.get(url, &params.to_query_pairs()).await?;
        Self::read_csv(response).await
    }

    async fn get_results_page(&self, next_uri: &str) -> Result<ResultsResponse> {
        let response = self.get(Self::continuation_url(next_uri)?, &[]).await?;
        Self::read_json(response, DuneError::Transport).await
    }

    async fn get_csv_page(&self, next_uri: &str) -> Result<CsvResponse> {
        let response = self.get(Self::continuation_url(next_uri)?, &[]).await?;
        Self::read_csv(response).await
    }

    async fn cancel_execution(&self, execution_id: &ExecutionId) -> Result<bool> {
        let url = self.endpoint(&format!("execution/{execution_id}/cancel"))?;
        let response = self.post(url, &serde_json::json!({})).await?;
        let cancel: CancelResponse = Self::read_json(response, DuneError::Transport).await?;
        Ok(cancel.success)
    }
}

// Dune API wire types

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    query_parameters: serde_json::Map<String, serde_json::Value>,
    performance: &'a str,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: serde_json::Value,
}

impl ErrorBody {
    fn message(&self) -> String {
        match &self.error {
            serde_json::Value::String(msg) => msg.clone(),
            serde_json::Value::Object(map) => map
                .get("type")
                .or_else(|| map.get("message"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.error.to_string()),
            other => other.to_string(),
        }
    }
}
