mod common;

use common::TestApp;
use voucher_service::services::init_metrics;

#[tokio::test]
async fn healthz_reports_ok() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/ready")).send().await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_format() {
    init_metrics();
    let app = TestApp::spawn().await;
    app.issue_ok(serde_json::json!({ "amount": 1, "beneficiary": "M" }))
        .await;

    let response = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert!(response.status().is_success());

    let content_type = response
        .headers()
        .get("content-type")
        .expect("Missing content-type header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = response.text().await.unwrap();
    assert!(body.contains("voucher_issued_total"));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/healthz"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn index_and_static_pages_are_served() {
    let app = TestApp::spawn().await;

    let index = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(index.status(), 200);
    assert!(index.text().await.unwrap().contains("/redeem.html"));

    let page = app.client.get(app.url("/verify.html")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert!(page.text().await.unwrap().contains("Verify a voucher"));

    let missing = app.client.get(app.url("/nope.html")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn graceful_shutdown_closes_the_store() {
    let mut app = TestApp::spawn().await;
    app.db.health_check().await.unwrap();

    app.shutdown().await.unwrap();

    assert!(app.db.health_check().await.is_err());
    assert!(app.client.get(app.url("/healthz")).send().await.is_err());
}
