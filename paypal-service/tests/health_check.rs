mod common;

use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "paypal-service");
}

#[tokio::test]
async fn unsolicited_return_is_acknowledged() {
    let app = TestApp::spawn().await;

    let response = app.get("/paypal-response/return?token=EC-STRAY").await;

    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn readiness_and_metrics_are_open() {
    let app = TestApp::spawn().await;

    let ready = app.get("/ready").await;
    assert!(ready.status().is_success());
    let body: serde_json::Value = ready.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ready");

    let metrics = app.get("/metrics").await;
    assert!(metrics.status().is_success());
}
