//! Agent roster endpoints
//!
//! Viewing the roster needs `TopSecret`; creating, updating or deleting an
//! agent needs roster administration rights, which only `Redline` holds.
//!
//! The last `Redline` agent can neither be deleted nor demoted, so the roster
//! always keeps an administrator.

use archive_clearance::{can_administer, Clearance, ResourceKind, Surface};
use hyper::StatusCode;
use serde_json::{Map, Value};

use super::{
    audit_mutation, deny, json_response, parse_json_object, payload_text, require_identity,
    require_surface, ApiRequest, ApiResult,
};
use crate::auth::{hash_password, Identity};
use crate::db::schemas::{now_iso, today};
use crate::db::{next_numeric_id, normalize_id, Agent, AgentRank};
use crate::logging::EventType;
use crate::server::AppState;
use crate::types::ArchiveError;

/// Keys the server owns; never copied from a payload into pass-through fields
const CONTROLLED_FIELDS: &[&str] = &[
    "id",
    "name",
    "username",
    "password",
    "rank",
    "clearance",
    "createdBy",
    "createdAt",
    "lastActive",
];

const REQUIRED_FIELDS: &[&str] = &["name", "password", "rank", "clearance"];

async fn require_roster_admin(state: &AppState, req: &ApiRequest) -> Result<Identity, ArchiveError> {
    let who = require_identity(state, req).await?;
    if !can_administer(&who, ResourceKind::Agents) {
        deny(state, &who, req, None).await;
        return Err(ArchiveError::Forbidden(
            "Redline clearance required to administer agents".into(),
        ));
    }
    Ok(who)
}

fn parse_clearance(raw: &str) -> Result<Clearance, ArchiveError> {
    Clearance::parse(raw).ok_or_else(|| {
        ArchiveError::BadRequest(format!(
            "Unknown clearance {:?}; expected one of Minimal, Restricted, Operational, TopSecret, Redline",
            raw
        ))
    })
}

fn parse_rank(raw: &str) -> Result<AgentRank, ArchiveError> {
    AgentRank::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = AgentRank::ALL.iter().map(|r| r.as_str()).collect();
        ArchiveError::BadRequest(format!(
            "Unknown rank {:?}; expected one of {}",
            raw,
            known.join(", ")
        ))
    })
}

fn username_taken(agents: &[Agent], username: &str, except_key: Option<&str>) -> bool {
    !username.is_empty()
        && agents.iter().any(|a| {
            a.username.trim().eq_ignore_ascii_case(username)
                && except_key.map_or(true, |k| normalize_id(&a.id) != k)
        })
}

fn redline_count(agents: &[Agent]) -> usize {
    agents
        .iter()
        .filter(|a| a.clearance == Clearance::Redline)
        .count()
}

fn pass_through(payload: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    payload
        .iter()
        .filter(|(k, _)| !CONTROLLED_FIELDS.contains(&k.as_str()))
}

/// GET /api/agents
pub async fn list_agents(state: &AppState, req: &ApiRequest) -> ApiResult {
    require_surface(state, req, Surface::AgentRoster).await?;
    let agents = state.db.agents.all().await;
    let views: Vec<_> = agents.iter().map(Agent::view).collect();
    Ok(json_response(StatusCode::OK, &views))
}

/// GET /api/agents/{id}
pub async fn get_agent(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    require_surface(state, req, Surface::AgentRoster).await?;
    let agent = state
        .db
        .agents
        .get(id)
        .await
        .ok_or_else(|| ArchiveError::NotFound("Agent not found".into()))?;
    Ok(json_response(StatusCode::OK, &agent.view()))
}

/// POST /api/agents
pub async fn create_agent(state: &AppState, req: &ApiRequest) -> ApiResult {
    let who = require_roster_admin(state, req).await?;
    let payload = parse_json_object(&req.body)?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|k| payload_text(&payload, k).map_or(true, |v| v.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(ArchiveError::BadRequest(format!(
            "Missing fields: {}",
            missing.join(", ")
        )));
    }

    let text = |key: &str| payload_text(&payload, key).unwrap_or_default();
    let clearance = parse_clearance(text("clearance").trim())?;
    let rank = parse_rank(&text("rank"))?;
    let password = hash_password(&text("password"))?;
    let username = text("username").trim().to_string();
    let requested_id = text("id").trim().to_string();

    let mut agent = Agent {
        id: String::new(),
        name: text("name").trim().to_string(),
        username,
        password,
        rank: rank.as_str().to_string(),
        clearance,
        created_by: who.display_name().to_string(),
        created_at: today(),
        last_active: now_iso(),
        extra: pass_through(&payload)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };

    let agent = state
        .db
        .agents
        .update(|agents| {
            if username_taken(agents, &agent.username, None) {
                return Err(ArchiveError::Conflict("Username already exists".into()));
            }
            agent.id = if requested_id.is_empty() {
                next_numeric_id(agents.iter().map(|a| a.id.as_str())).to_string()
            } else {
                let key = normalize_id(&requested_id);
                if agents.iter().any(|a| normalize_id(&a.id) == key) {
                    return Err(ArchiveError::Conflict(
                        "An agent with this ID already exists".into(),
                    ));
                }
                requested_id
            };
            agents.push(agent.clone());
            Ok(agent)
        })
        .await?;

    audit_mutation(state, &who, EventType::AgentCreated, format!("agents/{}", agent.id)).await;
    Ok(json_response(
        StatusCode::CREATED,
        &serde_json::json!({ "message": "created", "agent": agent.view() }),
    ))
}

/// PUT /api/agents/{id}
pub async fn update_agent(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_roster_admin(state, req).await?;
    let payload = parse_json_object(&req.body)?;

    let clearance = match payload_text(&payload, "clearance") {
        Some(raw) => Some(parse_clearance(raw.trim())?),
        None => None,
    };
    let rank = match payload_text(&payload, "rank") {
        Some(raw) => Some(parse_rank(&raw)?),
        None => None,
    };
    let password = match payload_text(&payload, "password") {
        Some(raw) if raw.is_empty() => {
            return Err(ArchiveError::BadRequest("Password cannot be empty".into()))
        }
        Some(raw) => Some(hash_password(&raw)?),
        None => None,
    };
    let name = payload_text(&payload, "name").map(|s| s.trim().to_string());
    let username = payload_text(&payload, "username").map(|s| s.trim().to_string());

    let key = normalize_id(id);
    let agent = state
        .db
        .agents
        .update(|agents| {
            let idx = agents
                .iter()
                .position(|a| normalize_id(&a.id) == key)
                .ok_or_else(|| ArchiveError::NotFound("Agent not found".into()))?;

            if let Some(ref username) = username {
                if username_taken(agents, username, Some(&key)) {
                    return Err(ArchiveError::Conflict("Username already exists".into()));
                }
            }
            if let Some(new) = clearance {
                if agents[idx].clearance == Clearance::Redline
                    && new != Clearance::Redline
                    && redline_count(agents) == 1
                {
                    return Err(ArchiveError::Conflict(
                        "Cannot demote the last Redline agent".into(),
                    ));
                }
            }

            let agent = &mut agents[idx];
            if let Some(name) = name {
                agent.name = name;
            }
            if let Some(username) = username {
                agent.username = username;
            }
            if let Some(password) = password {
                agent.password = password;
            }
            if let Some(rank) = rank {
                agent.rank = rank.as_str().to_string();
            }
            if let Some(clearance) = clearance {
                agent.clearance = clearance;
            }
            for (k, v) in pass_through(&payload) {
                agent.extra.insert(k.clone(), v.clone());
            }
            Ok(agent.clone())
        })
        .await?;

    audit_mutation(state, &who, EventType::AgentUpdated, format!("agents/{}", agent.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "updated", "agent": agent.view() }),
    ))
}

/// DELETE /api/agents/{id}
pub async fn delete_agent(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let who = require_roster_admin(state, req).await?;

    let key = normalize_id(id);
    let deleted = state
        .db
        .agents
        .update(|agents| {
            let idx = agents
                .iter()
                .position(|a| normalize_id(&a.id) == key)
                .ok_or_else(|| ArchiveError::NotFound("Agent not found".into()))?;
            if agents[idx].clearance == Clearance::Redline && redline_count(agents) == 1 {
                return Err(ArchiveError::Conflict(
                    "Cannot delete the last Redline agent".into(),
                ));
            }
            Ok(agents.remove(idx))
        })
        .await?;

    audit_mutation(state, &who, EventType::AgentDeleted, format!("agents/{}", deleted.id)).await;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "deleted", "agent": deleted.view() }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent(id: &str, username: &str, clearance: Clearance) -> Agent {
        Agent {
            id: id.into(),
            username: username.into(),
            clearance,
            ..Default::default()
        }
    }

    #[test]
    fn test_username_taken_is_case_insensitive() {
        let agents = vec![agent("1", "Kestrel", Clearance::Redline)];
        assert!(username_taken(&agents, "kestrel", None));
        assert!(!username_taken(&agents, "kestrel", Some("1")));
        assert!(!username_taken(&agents, "", None));
    }

    #[test]
    fn test_redline_count() {
        let agents = vec![
            agent("1", "a", Clearance::Redline),
            agent("2", "b", Clearance::TopSecret),
        ];
        assert_eq!(redline_count(&agents), 1);
    }

    #[test]
    fn test_pass_through_skips_controlled_fields() {
        let payload: Map<String, Value> = serde_json::from_value(json!({
            "id": "9", "password": "x", "createdBy": "me", "callSign": "HERON", "onDuty": true
        }))
        .unwrap();
        let mut keys: Vec<&str> = pass_through(&payload).map(|(k, _)| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["callSign", "onDuty"]);
    }

    #[test]
    fn test_parse_rank_and_clearance() {
        assert_eq!(parse_rank("senior agent").unwrap(), AgentRank::SeniorAgent);
        assert!(parse_rank("Captain").is_err());
        assert_eq!(parse_clearance("top secret").unwrap(), Clearance::TopSecret);
        assert!(parse_clearance("Cosmic").is_err());
    }
}
