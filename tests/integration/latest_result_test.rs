//! Latest-result reuse and refresh against a mocked Dune API.

use super::common::{client_for, hours_ago, results_page, status_body};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY_ID: u64 = 3493826;

async fn mount_latest(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/query/{QUERY_ID}/results")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_no_execute(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/query/{QUERY_ID}/execute")))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, execution_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/query/{QUERY_ID}/execute")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "execution_id": execution_id,
            "state": "QUERY_STATE_PENDING",
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/execution/{execution_id}/status")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(status_body(execution_id, "QUERY_STATE_COMPLETED")),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fresh_latest_is_reused() {
    let server = MockServer::start().await;
    mount_latest(&server, results_page("01HOLD", 0, 4, 4, Some(hours_ago(2)), None)).await;
    mount_no_execute(&server).await;

    let results = client_for(&server)
        .get_latest_result(QUERY_ID, None, Some(24))
        .await
        .unwrap();

    assert_eq!(results.execution_id.as_str(), "01HOLD");
    assert_eq!(results.row_count(), 4);
}

#[tokio::test]
async fn test_stale_latest_is_rerun() {
    let server = MockServer::start().await;
    mount_latest(&server, results_page("01HOLD", 0, 4, 4, Some(hours_ago(48)), None)).await;
    mount_refresh(&server, "01HNEW").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HNEW/results"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(results_page("01HNEW", 0, 6, 6, Some(hours_ago(0)), None)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server)
        .get_latest_result(QUERY_ID, None, Some(24))
        .await
        .unwrap();

    assert_eq!(results.execution_id.as_str(), "01HNEW");
    assert_eq!(results.row_count(), 6);
}

#[tokio::test]
async fn test_latest_without_end_time_counts_as_fresh() {
    let server = MockServer::start().await;
    mount_latest(&server, results_page("01HNOEND", 0, 1, 1, None, None)).await;
    mount_no_execute(&server).await;

    let results = client_for(&server)
        .get_latest_result(QUERY_ID, None, Some(1))
        .await
        .unwrap();

    assert_eq!(results.execution_id.as_str(), "01HNOEND");
}

#[tokio::test]
async fn test_fresh_latest_csv_uses_csv_endpoint() {
    let server = MockServer::start().await;
    mount_latest(&server, results_page("01HOLD", 0, 2, 2, Some(hours_ago(1)), None)).await;
    mount_no_execute(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/query/{QUERY_ID}/results/csv")))
        .and(query_param("limit", "32000"))
        .respond_with(ResponseTemplate::new(200).set_body_string("n\n0\n1\n"))
        .expect(1)
        .mount(&server)
        .await;

    let csv = client_for(&server)
        .get_latest_result_csv(QUERY_ID, None, Some(24))
        .await
        .unwrap();

    assert_eq!(csv, "n\n0\n1\n");
}

#[tokio::test]
async fn test_stale_latest_csv_reruns_as_csv() {
    let server = MockServer::start().await;
    mount_latest(&server, results_page("01HOLD", 0, 2, 2, Some(hours_ago(72)), None)).await;
    mount_refresh(&server, "01HCSVNEW").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/01HCSVNEW/results/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("n\n9\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/query/{QUERY_ID}/results/csv")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let csv = client_for(&server)
        .get_latest_result_csv(QUERY_ID, None, Some(24))
        .await
        .unwrap();

    assert_eq!(csv, "n\n9\n");
}
