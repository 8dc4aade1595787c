//! HTTP surface: hit-tracking middleware and the System Health read routes.
//!
//! ```ignore
//! let engine = Arc::new(MonitorEngine::new(config)?);
//! let app = Router::new()
//!     .nest("/api/v1", api_routes())
//!     .merge(pulse_engine::http::router(Arc::clone(&engine)))
//!     .layer(axum::middleware::from_fn_with_state(engine, track_hits));
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::engine::MonitorEngine;
use crate::hits::{CategoryCounter, TrafficSummary};
use crate::snapshot::HealthSnapshot;
use crate::window::RecentEvent;

// ----------------------------------------------------------------------------
// Middleware
// ----------------------------------------------------------------------------

/// Count every request passing through: one hit with its latency, and one
/// active connection for the lifetime of the request.
///
/// Install with `axum::middleware::from_fn_with_state(engine, track_hits)`.
pub async fn track_hits(State(engine): State<Arc<MonitorEngine>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    let response = {
        let _connection = engine.track_connection();
        next.run(request).await
    };

    let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
    engine.record_hit(&path, &method, Some(latency_ms));

    debug!(
        target: "pulse::http",
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms,
        "Request tracked"
    );

    response
}

// ----------------------------------------------------------------------------
// Routes
// ----------------------------------------------------------------------------

/// Read-only System Health routes.
pub fn router(engine: Arc<MonitorEngine>) -> Router {
    Router::new()
        .route("/system-health", get(full_snapshot))
        .route("/system-health/realtime", get(realtime_snapshot))
        .route("/system-health/api-hits", get(api_hits))
        .route("/system-health/recent", get(recent_activity))
        .route("/system-health/traffic", get(traffic))
        .with_state(engine)
}

/// Error body for failed reads.
#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(target: "pulse::http", error = %self.0, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": self.0 }))).into_response()
    }
}

async fn full_snapshot(State(engine): State<Arc<MonitorEngine>>) -> Result<Json<HealthSnapshot>, ApiError> {
    // Sampling sleeps for the CPU window
    let snapshot = tokio::task::spawn_blocking(move || engine.full_snapshot())
        .await
        .map_err(|e| ApiError(format!("snapshot task failed: {}", e)))?;
    Ok(Json(snapshot))
}

async fn realtime_snapshot(State(engine): State<Arc<MonitorEngine>>) -> Json<HealthSnapshot> {
    Json(engine.realtime_snapshot())
}

async fn api_hits(State(engine): State<Arc<MonitorEngine>>) -> Json<Vec<CategoryCounter>> {
    Json(engine.category_breakdown())
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

async fn recent_activity(
    State(engine): State<Arc<MonitorEngine>>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<RecentEvent>> {
    let events = match query.limit {
        Some(limit) => engine.recent_events(limit),
        None => engine.recent_events_default(),
    };
    Json(events)
}

async fn traffic(State(engine): State<Arc<MonitorEngine>>) -> Json<TrafficSummary> {
    Json(engine.traffic_summary())
}
