//! tierscale-api: REST API for the autoscaler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status` | Status of every configured cluster |
//! | GET | `/api/v1/clusters/{id}/status` | Status of one cluster |
//! | POST | `/api/v1/clusters/{id}/scale` | Force-scale to a tier |
//! | PUT | `/api/v1/clusters/{id}/scaling` | Enable or disable automatic scaling |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tierscale_autoscale::Orchestrator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the API router.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    let api_routes = Router::new()
        .route("/status", get(handlers::fleet_status))
        .route("/clusters/{id}/status", get(handlers::cluster_status))
        .route("/clusters/{id}/scale", post(handlers::force_scale))
        .route("/clusters/{id}/scaling", put(handlers::toggle_scaling))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
