//! Shared fixtures for the HTTP integration tests.

use chrono::{DateTime, Duration, Utc};
use dune_client::{ClientConfig, DuneClient};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const API_KEY: &str = "integration-key";

/// Creates a client pointed at `server` that polls without waiting.
pub fn client_for(server: &MockServer) -> DuneClient {
    let config = ClientConfig::new(API_KEY)
        .with_base_url(format!("{}/api/v1", server.uri()))
        .with_poll_frequency(0);
    DuneClient::new(config).expect("client should build")
}

/// Absolute URL for a path under the mocked API.
pub fn api_url(server: &MockServer, path: &str) -> String {
    format!("{}/api/v1/{}", server.uri(), path)
}

pub fn status_body(execution_id: &str, state: &str) -> Value {
    json!({
        "execution_id": execution_id,
        "query_id": 1215383,
        "state": state,
        "submitted_at": "2024-06-01T12:00:00Z",
    })
}

/// A JSON results page with rows `{"n": first}..{"n": first + count - 1}`.
pub fn results_page(
    execution_id: &str,
    first: usize,
    count: usize,
    total: usize,
    ended_at: Option<DateTime<Utc>>,
    next_uri: Option<String>,
) -> Value {
    let rows: Vec<Value> = (first..first + count).map(|n| json!({ "n": n })).collect();
    let mut body = json!({
        "execution_id": execution_id,
        "query_id": 1215383,
        "state": "QUERY_STATE_COMPLETED",
        "submitted_at": "2024-06-01T12:00:00Z",
        "result": {
            "rows": rows,
            "metadata": {
                "column_names": ["n"],
                "row_count": count,
                "total_row_count": total,
                "datapoint_count": total,
            }
        }
    });
    if let Some(ended_at) = ended_at {
        body["execution_ended_at"] = json!(ended_at.to_rfc3339());
    }
    if let Some(next_uri) = next_uri {
        body["next_uri"] = json!(next_uri);
        body["next_offset"] = json!(first + count);
    }
    body
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}
