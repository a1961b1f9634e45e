//! The observability HTTP endpoint: a `/healthz` liveness probe and a
//! `/metrics` snapshot of the egress buffer's counters.
//!
//! An explicit out-of-scope collaborator per the spec's §1 ("the
//! observability HTTP endpoint... [is] out of scope"), but the ambient
//! stack still follows the teacher: `axum` + `tower-http::TraceLayer`,
//! the same combination `crates/webhook`'s `routes.rs` wires up, and a
//! `watch`-channel-backed status handle in the shape of PostHog's
//! `common/health::HealthRegistry` (a component reports its latest state
//! by sending on a channel; the HTTP layer only ever reads the latest
//! value, never blocking the egress buffer's hot path).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use kafka_egress::BufferStats;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct HealthState {
    stats: watch::Receiver<BufferStats>,
}

impl HealthState {
    pub fn new(stats: watch::Receiver<BufferStats>) -> Self {
        Self { stats }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Healthy whenever the buffer is alive, or hasn't reported yet (the
/// startup probe still has a grace window to either succeed or fail the
/// process outright). Unhealthy while DOWN, matching the spool-and-recover
/// state from §4.3.3 — a readiness probe restarting the process here would
/// be counterproductive (the spool would be lost), so this is best wired
/// as a liveness check in front of a DOWN-tolerant deployment, not a
/// readiness gate.
async fn healthz(State(state): State<HealthState>) -> Response {
    let stats = *state.stats.borrow();
    if stats.alive {
        (StatusCode::OK, "alive").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "down, spooling").into_response()
    }
}

async fn metrics(State(state): State<HealthState>) -> Response {
    let stats = *state.stats.borrow();
    axum::Json(serde_json::json!({
        "alive": stats.alive,
        "spool_depth": stats.spool_depth,
        "writes": stats.writes,
        "msgs": stats.msgs,
        "failures": stats.failures,
    }))
    .into_response()
}
