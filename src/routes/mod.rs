//! HTTP route handlers
//!
//! Every guarded handler starts with [`require_surface`] (or
//! [`require_identity`]), which resolves the caller fresh from the request
//! and asks the guard before any record is read.

pub mod access;
pub mod agents;
pub mod auth_routes;
pub mod health;
pub mod intel;
pub mod people;
pub mod priority;

use archive_clearance::{can_enter_route, can_view_sensitive_fields, Classified, RouteDecision, Surface};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};
use hyper::{HeaderMap, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::{resolve_identity, Identity};
use crate::logging::{AuditEvent, EventType};
use crate::server::AppState;
use crate::types::ArchiveError;

pub type FullBody = Full<Bytes>;
pub type ApiResult = Result<Response<FullBody>, ArchiveError>;

/// Request bodies above this size are rejected
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A fully-read request, as handed to route handlers
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// `"POST /api/create"`, used in audit entries
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: String,
    code: &'a str,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn error_response(err: &ArchiveError) -> Response<FullBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.public_message(),
            code: err.code(),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<FullBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "code": "NOT_FOUND", "path": path }),
    )
}

/// Attach a `Set-Cookie` header
pub fn with_cookie(mut response: Response<FullBody>, cookie: &str) -> ApiResult {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ArchiveError::Internal(format!("Invalid cookie value: {}", e)))?;
    response.headers_mut().append(SET_COOKIE, value);
    Ok(response)
}

pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ArchiveError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ArchiveError::BadRequest("Request body too large".into()));
    }
    serde_json::from_slice(body).map_err(|e| ArchiveError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Parse a body that must be a JSON object
pub fn parse_json_object(body: &Bytes) -> Result<Map<String, Value>, ArchiveError> {
    match parse_json_body::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(ArchiveError::BadRequest("Expected a JSON object".into())),
    }
}

/// Text value of a payload field; numbers and booleans are stringified.
pub fn payload_text(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Resolve the caller or answer 401.
pub async fn require_identity(state: &AppState, req: &ApiRequest) -> Result<Identity, ArchiveError> {
    match resolve_identity(&req.headers, &state.jwt, &state.db.agents).await {
        Some(identity) => Ok(identity),
        None => {
            state
                .audit
                .log(AuditEvent::new(EventType::Unauthenticated).with_operation(req.operation()))
                .await;
            Err(ArchiveError::Unauthorized("Authentication required".into()))
        }
    }
}

/// Resolve the caller and check it may enter `surface`.
///
/// `RedirectToLogin` becomes 401 and `RedirectToHome` becomes 403.
pub async fn require_surface(
    state: &AppState,
    req: &ApiRequest,
    surface: Surface,
) -> Result<Identity, ArchiveError> {
    let identity = resolve_identity(&req.headers, &state.jwt, &state.db.agents).await;
    match can_enter_route(identity.as_ref(), surface.required_clearance()) {
        RouteDecision::Allow => identity.ok_or_else(|| {
            ArchiveError::Internal("route allowed without an identity".into())
        }),
        RouteDecision::RedirectToLogin => {
            state
                .audit
                .log(AuditEvent::new(EventType::Unauthenticated).with_operation(req.operation()))
                .await;
            Err(ArchiveError::Unauthorized("Authentication required".into()))
        }
        RouteDecision::RedirectToHome => {
            // Only reachable with an identity
            if let Some(ref who) = identity {
                deny(state, who, req, None).await;
            }
            Err(ArchiveError::Forbidden(format!(
                "{} clearance required",
                surface.required_clearance()
            )))
        }
    }
}

/// Record an authorization denial in the audit trail
pub async fn deny(state: &AppState, who: &Identity, req: &ApiRequest, target: Option<String>) {
    debug!("Denied {} for agent {}", req.operation(), who.id());
    let mut event = AuditEvent::new(EventType::AccessDenied)
        .with_actor(who.id(), who.username(), who.agent.clearance)
        .with_operation(req.operation());
    if let Some(target) = target {
        event = event.with_target(target);
    }
    state.audit.log(event).await;
}

/// Pass a store mutation's result on, auditing it first when the caller was
/// refused.
pub async fn audit_denial<T>(
    state: &AppState,
    who: &Identity,
    req: &ApiRequest,
    target: String,
    result: Result<T, ArchiveError>,
) -> Result<T, ArchiveError> {
    if let Err(ArchiveError::Forbidden(_)) = &result {
        deny(state, who, req, Some(target)).await;
    }
    result
}

/// Record a successful mutation in the audit trail
pub async fn audit_mutation(state: &AppState, who: &Identity, event_type: EventType, target: String) {
    state
        .audit
        .log(
            AuditEvent::new(event_type)
                .with_actor(who.id(), who.username(), who.agent.clearance)
                .with_target(target),
        )
        .await;
}

/// Mutation rights on a person or intel record: its creator, or anyone who
/// can see its sensitive fields.
pub fn can_mutate<R: Classified + ?Sized>(who: &Identity, created_by: &str, record: &R) -> bool {
    let creator = created_by.trim();
    (!creator.is_empty() && creator == who.display_name().trim())
        || can_view_sensitive_fields(record, who.access_level())
}

/// Route a fully-read request to its handler.
pub async fn dispatch(state: &AppState, req: ApiRequest) -> Response<FullBody> {
    let segments: Vec<String> = req
        .path
        .trim_matches('/')
        .split('/')
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
        .collect();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let result = match (&req.method, segments.as_slice()) {
        (&Method::GET, ["healthz"]) => health::health_check(state).await,

        (&Method::POST, ["api", "login"]) => auth_routes::handle_login(state, &req).await,
        (&Method::POST, ["api", "logout"]) => auth_routes::handle_logout(state, &req).await,
        (&Method::GET, ["api", "me"]) => auth_routes::handle_me(state, &req).await,
        (&Method::GET, ["api", "access", surface]) => {
            access::handle_access(state, &req, surface).await
        }

        (&Method::GET, ["api", "agents"]) => agents::list_agents(state, &req).await,
        (&Method::POST, ["api", "agents"]) => agents::create_agent(state, &req).await,
        (&Method::GET, ["api", "agents", id]) => agents::get_agent(state, &req, id).await,
        (&Method::PUT, ["api", "agents", id]) => agents::update_agent(state, &req, id).await,
        (&Method::DELETE, ["api", "agents", id]) => agents::delete_agent(state, &req, id).await,

        (&Method::GET, ["api", "all"]) => people::list_people(state, &req).await,
        (&Method::POST, ["api", "search"]) => people::search_people(state, &req).await,
        (&Method::GET, ["api", "persons-of-interest"]) => {
            people::persons_of_interest(state, &req).await
        }
        (&Method::POST, ["api", "create"]) => people::create_person(state, &req).await,
        (&Method::PUT, ["api", "update", id]) => people::update_person(state, &req, id).await,
        (&Method::DELETE, ["api", "delete", id]) => people::delete_person(state, &req, id).await,
        (&Method::POST, ["api", "people", id, "priority"]) => {
            people::set_person_priority(state, &req, id).await
        }

        (&Method::GET, ["api", "intel"]) => intel::list_intel(state, &req).await,
        (&Method::POST, ["api", "intel"]) => intel::create_intel(state, &req).await,
        (&Method::PUT, ["api", "intel", id]) => intel::update_intel(state, &req, id).await,
        (&Method::DELETE, ["api", "intel", id]) => intel::delete_intel(state, &req, id).await,
        (&Method::POST, ["api", "intel", id, "priority"]) => {
            intel::set_intel_priority(state, &req, id).await
        }
        (&Method::GET, ["api", "intel", id, "links"]) => intel::intel_links(state, &req, id).await,

        (&Method::GET, ["api", "priority"]) => priority::priority_summary(state, &req).await,

        _ => return not_found_response(&req.path),
    };

    result.unwrap_or_else(|err| {
        match &err {
            ArchiveError::Storage(_) | ArchiveError::Internal(_) | ArchiveError::Config(_) => {
                tracing::error!("{} failed: {}", req.operation(), err)
            }
            _ => debug!("{} rejected: {}", req.operation(), err),
        }
        error_response(&err)
    })
}
