//! Integration tests for the operator API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use operator_lib::{
    health::{Component, HealthRegistry},
    observability::OperatorMetrics,
    status::OperatorStatus,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

#[allow(dead_code)]
#[path = "../src/api.rs"]
mod api;

async fn setup_test_app() -> (Router, Arc<api::AppState>) {
    let health_registry = HealthRegistry::new();

    let status = OperatorStatus::new("cluster-a", "abc123");
    let state = Arc::new(api::AppState::new(
        health_registry,
        OperatorMetrics::new(),
        Arc::new(RwLock::new(status)),
    ));
    let router = api::create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"][Component::Prometheus.as_str()].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(Component::Collector, "query timed out")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_unavailable_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(Component::Storage, "read-only file system")
        .await;

    let (status, _) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_waits_for_directories() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["reasons"][0], "report directories not prepared");

    state.health_registry.set_directories_prepared(true).await;
    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_unavailable_while_prometheus_unreachable() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_directories_prepared(true).await;
    state
        .health_registry
        .set_unhealthy(Component::Prometheus, "connection refused")
        .await;
    state
        .health_registry
        .set_degraded(Component::Packager, "archive failed")
        .await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reasons"].as_array().unwrap().len(), 1);
    assert_eq!(readiness["reasons"][0], "prometheus: connection refused");
}

#[tokio::test]
async fn test_metrics_exposes_operator_metrics() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("cost_metrics_failed_queries_total"));
}

#[tokio::test]
async fn test_status_reflects_updates() {
    let (app, state) = setup_test_app().await;
    {
        let mut status = state.status.write().await;
        status.prometheus.prometheus_connected = true;
        status.reports.data_collection_message = "No data to report for the hour queried.".into();
    }

    let (status, body) = get(app, "/status").await;

    assert_eq!(status, StatusCode::OK);
    let snapshot: OperatorStatus = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot.cluster_id, "cluster-a");
    assert!(snapshot.prometheus.prometheus_connected);
    assert_eq!(
        snapshot.reports.data_collection_message,
        "No data to report for the hour queried."
    );
}
