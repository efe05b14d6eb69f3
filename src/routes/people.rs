//! Person dossier endpoints
//!
//! Listing and search need the search surface (`Minimal`); the persons of
//! interest view and deletion need `Restricted`. Every record is rendered
//! through [`GatedRecord::view_for`], so sensitive fields arrive either real
//! or as a redaction marker.

use archive_clearance::{can_view_sensitive_fields, resolve_record_level, Classified, Surface};
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{
    audit_denial, audit_mutation, can_mutate, deny, json_response, parse_json_body,
    parse_json_object, payload_text, require_surface, ApiRequest, ApiResult,
};
use crate::auth::Identity;
use crate::db::schemas::{de_text, today};
use crate::db::{next_int_id, normalize_id, GatedRecord, Person, StoredRecord};
use crate::logging::EventType;
use crate::server::AppState;
use crate::types::ArchiveError;

/// Keys a payload may not overwrite on update
const SERVER_FIELDS: &[&str] = &["id", "created_by", "last_updated", "updated_by", "high_priority_at"];

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default, deserialize_with = "de_text")]
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub enabled: bool,
}

fn render(people: &[Person], who: &Identity) -> Result<Vec<Value>, ArchiveError> {
    let level = who.access_level();
    people
        .iter()
        .map(|p| {
            p.view_for(level)
                .map_err(|e| ArchiveError::Internal(format!("Failed to render person: {}", e)))
        })
        .collect()
}

fn results(items: Vec<Value>) -> Value {
    serde_json::json!({ "results": items })
}

/// Parse a payload id: absent or null means "assign one".
pub(crate) fn payload_int_id(payload: &Map<String, Value>) -> Result<Option<i64>, ArchiveError> {
    let bad = || ArchiveError::BadRequest("ID must be an integer".into());
    match payload.get("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(bad),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| bad()),
        Some(_) => Err(bad()),
    }
}

/// A caller may never classify a record above its own level.
pub(crate) fn check_level_cap(
    who: &Identity,
    payload: &Map<String, Value>,
) -> Result<(), ArchiveError> {
    if let Some(raw) = payload_text(payload, "access_level") {
        let requested = resolve_record_level(&raw);
        if requested > who.access_level() {
            return Err(ArchiveError::Forbidden(format!(
                "Cannot classify a record above your own clearance ({})",
                who.access_level()
            )));
        }
    }
    Ok(())
}

/// Merge a payload over a record and re-read it as the typed schema.
pub(crate) fn merge_payload<T: StoredRecord>(
    existing: &T,
    payload: &Map<String, Value>,
    protected: &[&str],
) -> Result<T, ArchiveError> {
    let mut merged = match serde_json::to_value(existing) {
        Ok(Value::Object(map)) => map,
        _ => return Err(ArchiveError::Internal("Record did not encode as an object".into())),
    };
    for (k, v) in payload {
        if !protected.contains(&k.as_str()) {
            merged.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| ArchiveError::BadRequest(format!("Invalid record: {}", e)))
}

/// GET /api/all
pub async fn list_people(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;
    let people = state.db.people.all().await;
    Ok(json_response(StatusCode::OK, &results(render(&people, &who)?)))
}

/// POST /api/search
pub async fn search_people(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;
    let body: SearchRequest = parse_json_body(&req.body)?;
    let query = body.query.trim();
    if query.is_empty() {
        return Ok(json_response(StatusCode::OK, &results(Vec::new())));
    }

    let level = who.access_level();
    let hits: Vec<Person> = state
        .db
        .people
        .all()
        .await
        .into_iter()
        .filter(|p| p.matches(query, can_view_sensitive_fields(p, level)))
        .collect();
    Ok(json_response(StatusCode::OK, &results(render(&hits, &who)?)))
}

/// GET /api/persons-of-interest
pub async fn persons_of_interest(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::PersonsOfInterest).await?;
    let level = who.access_level();
    // Flags are gated, so only records whose flags the caller can read qualify
    let flagged: Vec<Person> = state
        .db
        .people
        .all()
        .await
        .into_iter()
        .filter(|p| can_view_sensitive_fields(p, level))
        .filter(|p| p.is_person_of_interest() || p.is_high_priority())
        .collect();
    Ok(json_response(StatusCode::OK, &results(render(&flagged, &who)?)))
}

/// POST /api/create
pub async fn create_person(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;
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

    let mut person: Person = serde_json::from_value(Value::Object(payload))
        .map_err(|e| ArchiveError::BadRequest(format!("Invalid person: {}", e)))?;
    person.canonicalize();

    let person = state
        .db
        .people
        .update(|people| {
            person.id = match requested_id {
                Some(id) => {
                    if people.iter().any(|p| p.id == id) {
                        return Err(ArchiveError::Conflict(
                            "A person with this ID already exists".into(),
                        ));
                    }
                    id
                }
                None => next_int_id(people.iter().map(|p| p.id)),
            };
            people.push(person.clone());
            Ok(person)
        })
        .await?;

    audit_mutation(state, &who, EventType::RecordCreated, format!("people/{}", person.id)).await;
    let view = person
        .view_for(who.access_level())
        .map_err(|e| ArchiveError::Internal(e.to_string()))?;
    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "message": "created", "person": view }),
    ))
}

/// Mutation rights alone: creator or a caller who sees the gated fields.
pub(crate) fn check_mutate<R: Classified>(
    who: &Identity,
    created_by: &str,
    record: &R,
) -> Result<(), ArchiveError> {
    if can_mutate(who, created_by, record) {
        Ok(())
    } else {
        Err(ArchiveError::Forbidden(format!(
            "{} access required to modify this record",
            record.required_level()
        )))
    }
}

/// Rights to apply `payload` to `record`. A caller who cannot see the gated
/// fields may not write them, nor any of `reclassify_keys`.
pub(crate) fn check_write<R: GatedRecord>(
    who: &Identity,
    created_by: &str,
    record: &R,
    payload: &Map<String, Value>,
    reclassify_keys: &[&str],
) -> Result<(), ArchiveError> {
    check_mutate(who, created_by, record)?;
    let sees_gated = can_view_sensitive_fields(record, who.access_level());
    let reclassifies = reclassify_keys.iter().any(|k| payload.contains_key(*k));
    if !sees_gated && (R::touches_gated(payload) || reclassifies) {
        return Err(ArchiveError::Forbidden(
            "Cannot modify fields above your clearance".into(),
        ));
    }
    check_level_cap(who, payload)
}

/// Flags are gated, so toggling one needs sight of the gated fields even
/// for the record's creator.
pub(crate) fn check_flag_write<R: Classified>(
    who: &Identity,
    created_by: &str,
    record: &R,
) -> Result<(), ArchiveError> {
    check_mutate(who, created_by, record)?;
    if !can_view_sensitive_fields(record, who.access_level()) {
        return Err(ArchiveError::Forbidden(
            "Cannot modify fields above your clearance".into(),
        ));
    }
    Ok(())
}

fn not_found() -> ArchiveError {
    ArchiveError::NotFound("Person not found".into())
}

fn render_one(person: &Person, who: &Identity) -> Result<Value, ArchiveError> {
    person
        .view_for(who.access_level())
        .map_err(|e| ArchiveError::Internal(e.to_string()))
}

/// PUT /api/update/{id}
pub async fn update_person(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;
    let payload = parse_json_object(&req.body)?;

    // Checked and merged against the stored record under the write lock
    let key = normalize_id(id);
    let outcome = state
        .db
        .people
        .update(|people| {
            let slot = people.iter_mut().find(|p| p.key() == key).ok_or_else(not_found)?;
            check_write(&who, &slot.created_by, &*slot, &payload, &["access_level"])?;

            let mut updated = merge_payload(&*slot, &payload, SERVER_FIELDS)?;
            updated.id = slot.id;
            updated.canonicalize();
            updated.last_updated = today();
            updated.updated_by = who.display_name().to_string();
            *slot = updated.clone();
            Ok(updated)
        })
        .await;
    let person = audit_denial(state, &who, req, format!("people/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::RecordUpdated, format!("people/{}", person.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "updated", "person": render_one(&person, &who)? }),
    ))
}

/// DELETE /api/delete/{id}
pub async fn delete_person(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::PersonsOfInterest).await?;

    let key = normalize_id(id);
    let outcome = state
        .db
        .people
        .update(|people| {
            let idx = people.iter().position(|p| p.key() == key).ok_or_else(not_found)?;
            check_mutate(&who, &people[idx].created_by, &people[idx])?;
            Ok(people.remove(idx))
        })
        .await;
    let deleted = audit_denial(state, &who, req, format!("people/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::RecordDeleted, format!("people/{}", deleted.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "deleted", "person": render_one(&deleted, &who)? }),
    ))
}

/// POST /api/people/{id}/priority
pub async fn set_person_priority(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_surface(state, req, Surface::Search).await?;
    let body: PriorityRequest = parse_json_body(&req.body)?;

    let key = normalize_id(id);
    let editor = who.display_name().to_string();
    let outcome = state
        .db
        .people
        .update(|people| {
            let person = people.iter_mut().find(|p| p.key() == key).ok_or_else(not_found)?;
            check_flag_write(&who, &person.created_by, &*person)?;
            if person.set_priority(body.enabled) {
                person.last_updated = today();
                person.updated_by = editor;
            }
            Ok(person.clone())
        })
        .await;
    let person = audit_denial(state, &who, req, format!("people/{}", key), outcome).await?;

    audit_mutation(state, &who, EventType::PriorityChanged, format!("people/{}", person.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "updated", "person": render_one(&person, &who)? }),
    ))
}
