//! Health check endpoint
//!
//! `/healthz` answers 200 whenever the process is serving, with record counts
//! so an operator can spot an empty data directory.

use hyper::StatusCode;
use serde::Serialize;

use super::{json_response, ApiResult};
use crate::db::schemas::now_iso;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: String,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub records: RecordCounts,
}

#[derive(Serialize)]
pub struct RecordCounts {
    pub agents: usize,
    pub people: usize,
    pub intel: usize,
}

/// GET /healthz
pub async fn health_check(state: &AppState) -> ApiResult {
    let body = HealthResponse {
        status: "ok",
        time: now_iso(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        records: RecordCounts {
            agents: state.db.agents.len().await,
            people: state.db.people.len().await,
            intel: state.db.intel.len().await,
        },
    };
    Ok(json_response(StatusCode::OK, &body))
}
