//! Login, logout and current-session endpoints

use archive_clearance::{Capabilities, ViewerTier};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{json_response, parse_json_body, require_identity, with_cookie, ApiRequest, ApiResult};
use crate::auth::{
    check_password, clear_session_cookie, hash_password, resolve_identity, session_cookie,
    PasswordCheck, TokenInput,
};
use crate::db::schemas::{de_text, now_iso};
use crate::db::{normalize_id, AgentView};
use crate::logging::{AuditEvent, EventType};
use crate::server::AppState;
use crate::types::ArchiveError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "de_text")]
    pub username: String,
    #[serde(default, deserialize_with = "de_text")]
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse<'a> {
    user: AgentView<'a>,
    token: String,
    /// Unix timestamp
    expires_at: u64,
    capabilities: Capabilities,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse<'a> {
    user: AgentView<'a>,
    viewer_tier: ViewerTier,
    capabilities: Capabilities,
}

/// POST /api/login
pub async fn handle_login(state: &AppState, req: &ApiRequest) -> ApiResult {
    let body: LoginRequest = parse_json_body(&req.body)?;
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(ArchiveError::BadRequest(
            "Username and password are required".into(),
        ));
    }

    let candidate = state
        .db
        .agents
        .all()
        .await
        .into_iter()
        .find(|a| a.username.trim().eq_ignore_ascii_case(username));

    let check = match &candidate {
        Some(agent) => check_password(&body.password, &agent.password).unwrap_or_else(|e| {
            warn!("Stored credential for {} is unreadable: {}", agent.username, e);
            PasswordCheck::Mismatch
        }),
        None => PasswordCheck::Mismatch,
    };

    let agent = match candidate {
        Some(agent) if check.is_match() => agent,
        _ => {
            state.audit.log_login(username, false).await;
            return Err(ArchiveError::Unauthorized("Invalid credentials".into()));
        }
    };

    let rehash = match check {
        PasswordCheck::MatchNeedsRehash => Some(hash_password(&body.password)?),
        _ => None,
    };
    let key = normalize_id(&agent.id);
    let now = now_iso();
    let agent = state
        .db
        .agents
        .update(|agents| {
            let stored = agents
                .iter_mut()
                .find(|a| normalize_id(&a.id) == key)
                .ok_or_else(|| ArchiveError::Unauthorized("Invalid credentials".into()))?;
            stored.last_active = now;
            if let Some(hash) = rehash {
                stored.password = hash;
            }
            Ok(stored.clone())
        })
        .await?;

    if check == PasswordCheck::MatchNeedsRehash {
        info!("Upgraded legacy credential for agent {}", agent.id);
    }

    let (token, claims) = state.jwt.generate_token(TokenInput {
        agent_id: agent.id.clone(),
        username: agent.username.clone(),
        clearance: agent.clearance,
    })?;

    state
        .audit
        .log(
            AuditEvent::new(EventType::LoginSucceeded)
                .with_actor(&agent.id, &agent.username, agent.clearance),
        )
        .await;

    let cookie = session_cookie(&token, state.jwt.expiry_seconds(), state.args.secure_cookies);
    let response = json_response(
        StatusCode::OK,
        &LoginResponse {
            user: agent.view(),
            token,
            expires_at: claims.exp,
            capabilities: Capabilities::for_agent(&agent),
        },
    );
    with_cookie(response, &cookie)
}

/// POST /api/logout
pub async fn handle_logout(state: &AppState, req: &ApiRequest) -> ApiResult {
    if let Some(who) = resolve_identity(&req.headers, &state.jwt, &state.db.agents).await {
        state
            .audit
            .log(
                AuditEvent::new(EventType::Logout)
                    .with_actor(who.id(), who.username(), who.agent.clearance),
            )
            .await;
    }

    let response = json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "logged out" }),
    );
    with_cookie(response, &clear_session_cookie(state.args.secure_cookies))
}

/// GET /api/me
pub async fn handle_me(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_identity(state, req).await?;
    Ok(json_response(
        StatusCode::OK,
        &MeResponse {
            user: who.agent.view(),
            viewer_tier: ViewerTier::for_clearance(who.agent.clearance),
            capabilities: Capabilities::for_agent(&who),
        },
    ))
}
