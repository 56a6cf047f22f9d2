//! Execute, poll and paginate against a mocked Dune API.

use super::common::{api_url, client_for, results_page, status_body, API_KEY};
use dune_client::types::{ExecutionState, QueryParameter, QueryParameters};
use dune_client::DuneError;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXECUTION_ID: &str = "01HRUNQUERY137";

async fn mount_execute(server: &MockServer, query_id: u64, execution_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/query/{query_id}/execute")))
        .and(header("x-dune-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": execution_id,
            "state": "QUERY_STATE_PENDING",
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts one status response per state; the last one answers all later polls.
async fn mount_statuses(server: &MockServer, execution_id: &str, states: &[&str]) {
    let status_path = format!("/api/v1/execution/{execution_id}/status");
    for (i, state) in states.iter().enumerate() {
        let mock = Mock::given(method("GET"))
            .and(path(status_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body(execution_id, state)));
        let mock = if i + 1 < states.len() {
            mock.up_to_n_times(1)
        } else {
            mock
        };
        mock.mount(server).await;
    }
}

#[tokio::test]
async fn test_run_query_polls_and_joins_pages() {
    let server = MockServer::start().await;
    let results_path = format!("/api/v1/execution/{EXECUTION_ID}/results");
    let next_uri = format!(
        "{}?limit=100&offset=100",
        api_url(&server, &format!("execution/{EXECUTION_ID}/results"))
    );

    mount_execute(&server, 1215383, EXECUTION_ID).await;
    mount_statuses(
        &server,
        EXECUTION_ID,
        &["QUERY_STATE_PENDING", "QUERY_STATE_EXECUTING", "QUERY_STATE_COMPLETED"],
    )
    .await;

    Mock::given(method("GET"))
        .and(path(results_path.clone()))
        .and(query_param("offset", "100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(results_page(EXECUTION_ID, 100, 37, 137, None, None)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(results_path))
        .and(query_param("limit", "32000"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_page(
            EXECUTION_ID,
            0,
            100,
            137,
            None,
            Some(next_uri),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server).run_query(1215383, None).await.unwrap();

    assert_eq!(results.row_count(), 137);
    assert_eq!(results.rows()[0]["n"], json!(0));
    assert_eq!(results.rows()[136]["n"], json!(136));
    assert_eq!(results.next_uri, None);
    let metadata = results.metadata().unwrap();
    assert_eq!(metadata.row_count, 100);
    assert_eq!(metadata.total_row_count, 137);

    let status_polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/status"))
        .count();
    assert_eq!(status_polls, 3);
}

#[tokio::test]
async fn test_run_query_sends_parameters_and_tier() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/query/42/execute"))
        .and(body_json(json!({
            "query_parameters": { "chain": "base" },
            "performance": "medium",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": "01HPARAMS",
            "state": "QUERY_STATE_PENDING",
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_statuses(&server, "01HPARAMS", &["QUERY_STATE_COMPLETED"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HPARAMS/results"))
        .and(query_param("limit", "32000"))
        .and(query_param_is_missing("params.chain"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(results_page("01HPARAMS", 0, 3, 3, None, None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let params = QueryParameters::new(vec![QueryParameter::text("chain", "base")]).unwrap();
    let results = client_for(&server).run_query(42, Some(params)).await.unwrap();

    assert_eq!(results.row_count(), 3);
}

#[tokio::test]
async fn test_failed_execution_skips_results() {
    let server = MockServer::start().await;

    mount_execute(&server, 7, "01HFAILED").await;
    mount_statuses(&server, "01HFAILED", &["QUERY_STATE_EXECUTING", "QUERY_STATE_FAILED"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HFAILED/results"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server).run_query(7, None).await.unwrap_err();

    match err {
        DuneError::IncompleteExecution {
            query_id,
            execution_id,
            state,
        } => {
            assert_eq!(query_id, Some(7));
            assert_eq!(execution_id.as_str(), "01HFAILED");
            assert_eq!(state, ExecutionState::Failed);
        }
        other => panic!("Expected IncompleteExecution, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_submission_never_polls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/query/9/execute"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Query not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server).run_query(9, None).await.unwrap_err();

    assert!(matches!(err, DuneError::Submission(_)), "got {:?}", err);
    assert!(err.to_string().contains("Query not found"));
}

#[tokio::test]
async fn test_run_query_csv_follows_headers() {
    let server = MockServer::start().await;
    let csv_path = "/api/v1/execution/01HCSV/results/csv";
    let next_uri = format!("{}?limit=2&offset=2", api_url(&server, "execution/01HCSV/results/csv"));

    mount_execute(&server, 5, "01HCSV").await;
    mount_statuses(&server, "01HCSV", &["QUERY_STATE_PENDING", "QUERY_STATE_COMPLETED"]).await;
    Mock::given(method("GET"))
        .and(path(csv_path))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("3\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(csv_path))
        .and(query_param_is_missing("offset"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("n\n1\n2\n")
                .insert_header("x-dune-next-uri", next_uri.as_str())
                .insert_header("x-dune-next-offset", "2"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let csv = client_for(&server).run_query_csv(5, None).await.unwrap();

    assert_eq!(csv, "n\n1\n2\n3\n");
}

#[tokio::test]
async fn test_broken_continuation_surfaces_error() {
    let server = MockServer::start().await;
    let next_uri = format!("{}?offset=2", api_url(&server, "execution/01HBROKEN/results"));

    mount_execute(&server, 3, "01HBROKEN").await;
    mount_statuses(&server, "01HBROKEN", &["QUERY_STATE_COMPLETED"]).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HBROKEN/results"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HBROKEN/results"))
        .and(query_param_is_missing("offset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_page(
            "01HBROKEN",
            0,
            2,
            4,
            None,
            Some(next_uri),
        )))
        .mount(&server)
        .await;

    let err = client_for(&server).run_query(3, None).await.unwrap_err();

    assert!(err.to_string().contains("upstream exploded"), "got {}", err);
}
