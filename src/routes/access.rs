//! Route-decision endpoint
//!
//! Lets a client ask the guard before rendering a surface. The answer is a
//! decision value, so even anonymous callers get a 200.

use archive_clearance::{can_enter_route, Clearance, RouteDecision, Surface};
use hyper::StatusCode;
use serde::Serialize;

use super::{json_response, ApiRequest, ApiResult};
use crate::auth::resolve_identity;
use crate::server::AppState;
use crate::types::ArchiveError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse {
    surface: Surface,
    requires: Clearance,
    decision: RouteDecision,
}

/// GET /api/access/{surface}
pub async fn handle_access(state: &AppState, req: &ApiRequest, slug: &str) -> ApiResult {
    let surface = Surface::from_slug(slug)
        .ok_or_else(|| ArchiveError::NotFound(format!("Unknown surface: {}", slug)))?;

    let identity = resolve_identity(&req.headers, &state.jwt, &state.db.agents).await;
    let decision = can_enter_route(identity.as_ref(), surface.required_clearance());

    Ok(json_response(
        StatusCode::OK,
        &AccessResponse {
            surface,
            requires: surface.required_clearance(),
            decision,
        },
    ))
}
