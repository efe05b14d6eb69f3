//! High Priority summary
//!
//! Flags are gated fields, so a record only appears when the caller could
//! read its flags anyway. Intel is left out entirely for callers who cannot
//! enter the intel surface.

use archive_clearance::{can_enter_route, can_view_sensitive_fields, AccessLevel, Surface};
use hyper::StatusCode;
use serde::Serialize;

use super::{json_response, require_surface, ApiRequest, ApiResult};
use crate::db::{IntelReport, Person};
use crate::server::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityKind {
    Person,
    Intel,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityItem {
    pub kind: PriorityKind,
    pub id: i64,
    /// Person name or report title
    pub label: String,
    pub high_priority_at: Option<String>,
    pub access_level: AccessLevel,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PriorityResponse {
    results: Vec<PriorityItem>,
    intel_included: bool,
}

/// Flagged records visible to `viewer`, newest flag first.
pub fn collect_priority(
    people: &[Person],
    intel: Option<&[IntelReport]>,
    viewer: AccessLevel,
) -> Vec<PriorityItem> {
    use archive_clearance::Classified;

    let mut items: Vec<PriorityItem> = people
        .iter()
        .filter(|p| p.is_high_priority() && can_view_sensitive_fields(*p, viewer))
        .map(|p| PriorityItem {
            kind: PriorityKind::Person,
            id: p.id,
            label: p.full_name.clone(),
            high_priority_at: p.high_priority_at.clone(),
            access_level: p.required_level(),
        })
        .collect();

    if let Some(intel) = intel {
        items.extend(
            intel
                .iter()
                .filter(|r| r.is_high_priority() && can_view_sensitive_fields(*r, viewer))
                .map(|r| PriorityItem {
                    kind: PriorityKind::Intel,
                    id: r.id,
                    label: r.title.clone(),
                    high_priority_at: r.high_priority_at.clone(),
                    access_level: r.required_level(),
                }),
        );
    }

    // RFC 3339 UTC stamps order lexically; missing stamps sort last
    items.sort_by(|a, b| b.high_priority_at.cmp(&a.high_priority_at));
    items
}

/// GET /api/priority
pub async fn priority_summary(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;

    let intel_included =
        can_enter_route(Some(&who), Surface::IntelFiles.required_clearance()).is_allowed();
    let people = state.db.people.all().await;
    let intel = if intel_included {
        state.db.intel.all().await
    } else {
        Vec::new()
    };

    let results = collect_priority(
        &people,
        intel_included.then_some(intel.as_slice()),
        who.access_level(),
    );
    Ok(json_response(
        StatusCode::OK,
        &PriorityResponse {
            results,
            intel_included,
        },
    ))
}
