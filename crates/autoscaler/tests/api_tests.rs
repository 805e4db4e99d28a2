//! Integration tests for the autoscaler API endpoints

use autoscaler_lib::{
    api::{create_router, AppState},
    cycle::{ClaimOutcome, CycleReport, SharedReport},
    health::{components, HealthRegistry, UNHEALTHY_AFTER_FAILED_CYCLES},
    ClaimId, CycleFatalError, SkipReason,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::with_components().await;
    let state = Arc::new(AppState::new(health_registry, SharedReport::default()));
    let router = create_router(state.clone());

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
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::METRICS_SOURCE, "Prometheus unreachable")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_after_repeated_failed_cycles() {
    let (app, state) = setup_test_app().await;
    let err = CycleFatalError::Discovery("Unauthorized".to_string());

    for _ in 0..UNHEALTHY_AFTER_FAILED_CYCLES {
        state.health_registry.record_cycle(Err(&err)).await;
    }

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["reconciler"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let (_, body) = get(app, "/healthz").await;

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(health["components"]["reconciler"].is_object());
    assert!(health["components"]["metrics_source"].is_object());
    assert!(health["components"]["kubernetes_api"].is_object());
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_completed_cycle() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .record_cycle(Ok(&CycleReport::default()))
        .await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    // Registers the collectors in the default registry
    autoscaler_lib::AutoscalerMetrics::new().inc_skips(&SkipReason::AtCeiling {
        ceiling_bytes: 1,
    });

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("pvc_autoscaler_skips_total"));
    assert!(metrics_text.contains("reason=\"at_ceiling\""));
}

#[tokio::test]
async fn test_last_cycle_returns_404_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get(app, "/cycles/last").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_last_cycle_returns_report() {
    let (app, state) = setup_test_app().await;

    let mut report = CycleReport::default();
    report.discovered = 1;
    report.claims.push(autoscaler_lib::cycle::ClaimReport {
        claim: ClaimId::new("db", "data-0"),
        outcome: ClaimOutcome::Skipped {
            reason: SkipReason::BelowThreshold {
                used_bytes: 10,
                threshold_bytes: 80,
            },
        },
    });
    *state.last_cycle.write().await = Some(report);

    let (status, body) = get(app, "/cycles/last").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["discovered"], 1);
    assert_eq!(json["claims"][0]["claim"]["namespace"], "db");
    assert_eq!(json["claims"][0]["outcome"], "skipped");
    assert_eq!(json["claims"][0]["reason"]["code"], "below_threshold");
}
