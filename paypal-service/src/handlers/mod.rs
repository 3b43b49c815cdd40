//! HTTP handlers for paypal-service.

pub mod paypal;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;

/// Liveness endpoint for Docker/K8s.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "paypal-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness endpoint for K8s.
pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        get_metrics(),
    )
}
