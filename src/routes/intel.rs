//! Intel report endpoints
//!
//! The whole intel surface requires `Operational`.

use archive_clearance::Surface;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::people::{
    check_flag_write, check_level_cap, check_mutate, check_write, merge_payload, payload_int_id,
    PriorityRequest,
};
use super::{
    audit_denial, audit_mutation, deny, json_response, parse_json_body, parse_json_object,
    require_surface, ApiRequest, ApiResult,
};
use crate::auth::Identity;
use crate::db::schemas::today;
use crate::db::{next_int_id, normalize_id, GatedRecord, IntelReport, StoredRecord};
use crate::logging::EventType;
use crate::server::AppState;
use crate::types::ArchiveError;

const SERVER_FIELDS: &[&str] = &["id", "created_by", "last_updated", "updated_by", "high_priority_at"];

fn view(report: &IntelReport, who: &Identity) -> Result<Value, ArchiveError> {
    report
        .view_for(who.access_level())
        .map_err(|e| ArchiveError::Internal(format!("Failed to render intel: {}", e)))
}

/// A linked name and the person records it resolves to
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonLink {
    pub name: String,
    pub person_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinksResponse {
    id: i64,
    links: Vec<PersonLink>,
    /// Names that match no person (renamed or never recorded)
    dangling: Vec<String>,
}

/// GET /api/intel
pub async fn list_intel(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::IntelFiles).await?;
    let reports = state.db.intel.all().await;
    let items = reports
        .iter()
        .map(|r| view(r, &who))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "results": items }),
    ))
}

/// POST /api/intel
pub async fn create_intel(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::IntelFiles).await?;
    let mut payload = parse_json_object(&req.body)?;
    let requested_id = payload_int_id(&payload)?;
    if let Err(e) = check_level_cap(&who, &payload) {
        deny(state, &who, req, None).await;
        return Err(e);
    }

    payload.remove("high_priority_at");
    payload.insert("id".into(), Value::from(0));
    payload.insert("created_by".into(), Value::from(who.display_name()));
    payload.insert("last_updated".into(), Value::from(today()));
    payload.insert("updated_by".into(), Value::from(""));

    let mut report: IntelReport = serde_json::from_value(Value::Object(payload))
        .map_err(|e| ArchiveError::BadRequest(format!("Invalid intel report: {}", e)))?;
    report.canonicalize();

    let report = state
        .db
        .intel
        .update(|reports| {
            report.id = match requested_id {
                Some(id) => {
                    if reports.iter().any(|r| r.id == id) {
                        return Err(ArchiveError::Conflict(
                            "An intel report with this ID already exists".into(),
                        ));
                    }
                    id
                }
                None => next_int_id(reports.iter().map(|r| r.id)),
            };
            reports.push(report.clone());
            Ok(report)
        })
        .await?;

    audit_mutation(state, &who, EventType::RecordCreated, format!("intel/{}", report.id)).await;
    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "message": "created", "entry": view(&report, &who)? }),
    ))
}

fn not_found() -> ArchiveError {
    ArchiveError::NotFound("Intel not found".into())
}

/// PUT /api/intel/{id}
pub async fn update_intel(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::IntelFiles).await?;
    let payload = parse_json_object(&req.body)?;

    // Reclassification counts as a gated write
    let key = normalize_id(id);
    let outcome = state
        .db
        .intel
        .update(|reports| {
            let slot = reports.iter_mut().find(|r| r.key() == key).ok_or_else(not_found)?;
            check_write(
                &who,
                &slot.created_by,
                &*slot,
                &payload,
                &["access_level", "classification"],
            )?;

            let mut updated = merge_payload(&*slot, &payload, SERVER_FIELDS)?;
            updated.id = slot.id;
            updated.canonicalize();
            updated.last_updated = today();
            updated.updated_by = who.display_name().to_string();
            *slot = updated.clone();
            Ok(updated)
        })
        .await;
    let report = audit_denial(state, &who, req, format!("intel/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::RecordUpdated, format!("intel/{}", report.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "updated", "entry": view(&report, &who)? }),
    ))
}

/// DELETE /api/intel/{id}
pub async fn delete_intel(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::IntelFiles).await?;

    let key = normalize_id(id);
    let outcome = state
        .db
        .intel
        .update(|reports| {
            let idx = reports.iter().position(|r| r.key() == key).ok_or_else(not_found)?;
            check_mutate(&who, &reports[idx].created_by, &reports[idx])?;
            Ok(reports.remove(idx))
        })
        .await;
    let deleted = audit_denial(state, &who, req, format!("intel/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::RecordDeleted, format!("intel/{}", deleted.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "deleted", "intel": view(&deleted, &who)? }),
    ))
}

/// POST /api/intel/{id}/priority
pub async fn set_intel_priority(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::IntelFiles).await?;
    let body: PriorityRequest = parse_json_body(&req.body)?;

    let key = normalize_id(id);
    let editor = who.display_name().to_string();
    let outcome = state
        .db
        .intel
        .update(|reports| {
            let report = reports.iter_mut().find(|r| r.key() == key).ok_or_else(not_found)?;
            check_flag_write(&who, &report.created_by, &*report)?;
            if report.set_priority(body.enabled) {
                report.last_updated = today();
                report.updated_by = editor;
            }
            Ok(report.clone())
        })
        .await;
    let report = audit_denial(state, &who, req, format!("intel/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::PriorityChanged, format!("intel/{}", report.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "updated", "entry": view(&report, &who)? }),
    ))
}

/// Resolve linked person names against the people collection.
pub fn resolve_links(
    report: &IntelReport,
    people: &[crate::db::Person],
) -> (Vec<PersonLink>, Vec<String>) {
    let mut links = Vec::new();
    let mut dangling = Vec::new();
    for name in &report.linked_persons {
        let person_ids: Vec<i64> = people
            .iter()
            .filter(|p| p.answers_to(name))
            .map(|p| p.id)
            .collect();
        if person_ids.is_empty() {
            dangling.push(name.clone());
        } else {
            links.push(PersonLink {
                name: name.clone(),
                person_ids,
            });
        }
    }
    (links, dangling)
}

/// GET /api/intel/{id}/links
pub async fn intel_links(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    require_surface(state, req, Surface::IntelFiles).await?;
    let report = state
        .db
        .intel
        .get(id)
        .await
        .ok_or_else(|| ArchiveError::NotFound("Intel not found".into()))?;

    let people = state.db.people.all().await;
    let (links, dangling) = resolve_links(&report, &people);
    Ok(json_response(
        StatusCode::OK,
        &LinksResponse {
            id: report.id,
            links,
            dangling,
        },
    ))
}
