//! REST API handlers.
//!
//! Every handler talks to the shared `Orchestrator` and returns the
//! `{success, data?, error?}` envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::info;

use tierscale_autoscale::{ExecutorError, ScaleError};
use tierscale_core::Size;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn unknown_cluster(id: &str) -> axum::response::Response {
    error_response(&format!("cluster {id} is not managed"), StatusCode::NOT_FOUND).into_response()
}

// ── Status ─────────────────────────────────────────────────────

/// GET /api/v1/status
pub async fn fleet_status(State(state): State<ApiState>) -> impl IntoResponse {
    let orchestrator = &state.orchestrator;
    ApiResponse::ok(orchestrator.report(orchestrator.clusters()).await)
}

/// GET /api/v1/clusters/:id/status
pub async fn cluster_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !state.orchestrator.clusters().contains(&id) {
        return unknown_cluster(&id);
    }
    let mut report = state.orchestrator.report(std::slice::from_ref(&id)).await;
    match report.clusters.remove(&id) {
        Some(status) => ApiResponse::ok(status).into_response(),
        None => unknown_cluster(&id),
    }
}

// ── Scaling ────────────────────────────────────────────────────

/// Force-scale request body.
#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    pub target_size: Size,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/v1/clusters/:id/scale
pub async fn force_scale(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ScaleRequest>,
) -> impl IntoResponse {
    if !state.orchestrator.clusters().contains(&id) {
        return unknown_cluster(&id);
    }

    info!(cluster = %id, target = %req.target_size, "force-scale requested via API");
    match state
        .orchestrator
        .force_scale(&id, &req.target_size, req.reason.as_deref())
        .await
    {
        Ok(result) => ApiResponse::ok(result).into_response(),
        Err(e) => {
            let status = match &e {
                ScaleError::Ladder(_) => StatusCode::BAD_REQUEST,
                ScaleError::SizeLookup {
                    source: ExecutorError::UnknownCluster(_),
                    ..
                } => StatusCode::NOT_FOUND,
                ScaleError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ScaleError::SizeLookup { .. } | ScaleError::Execution { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            error_response(&e.to_string(), status).into_response()
        }
    }
}

/// Toggle request body.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    cluster_id: String,
    enabled: bool,
    previous: bool,
}

/// PUT /api/v1/clusters/:id/scaling
pub async fn toggle_scaling(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    if !state.orchestrator.clusters().contains(&id) {
        return unknown_cluster(&id);
    }

    let previous = state.orchestrator.set_scaling_enabled(&id, req.enabled).await;
    ApiResponse::ok(ToggleResponse {
        cluster_id: id,
        enabled: req.enabled,
        previous,
    })
    .into_response()
}
