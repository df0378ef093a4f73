use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json, Router};
use chrono::{Local, NaiveDate};
use marriage_compliance::compliance::{ComplianceSweep, SweepSummary};
use marriage_compliance::error::AppError;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepRequest {
    #[serde(default)]
    pub(crate) today: Option<NaiveDate>,
}

/// Mount health, readiness, metrics and the manual sweep trigger next to the compliance API.
pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/compliance/sweep",
            axum::routing::post(sweep_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn sweep_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<SweepRequest>,
) -> Result<Json<SweepSummary>, AppError> {
    let today = payload.today.unwrap_or_else(|| Local::now().date_naive());
    let summary = ComplianceSweep::new(state.store.clone()).run(today)?;
    Ok(Json(summary))
}
