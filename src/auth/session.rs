//! Per-request identity
//!
//! The caller's identity is resolved fresh on every request: token from the
//! session cookie (or a bearer header), then the agent re-loaded from the
//! roster. Clearance always comes from the roster, so a demotion or deletion
//! takes effect on the very next request.

use archive_clearance::{AccessLevel, Clearance, ClearanceHolder};
use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;
use tracing::debug;

use super::jwt::{extract_token_from_cookie, extract_token_from_header, JwtValidator};
use crate::db::{Agent, JsonCollection};

/// Session cookie name
pub const SESSION_COOKIE: &str = "archive_session";

/// The authenticated caller of one request
#[derive(Debug, Clone)]
pub struct Identity {
    pub agent: Agent,
}

impl Identity {
    pub fn id(&self) -> &str {
        &self.agent.id
    }

    pub fn username(&self) -> &str {
        &self.agent.username
    }

    /// Snapshot written into `created_by` / `updated_by`
    pub fn display_name(&self) -> &str {
        self.agent.display_name()
    }

    /// The agent's position on the record scale
    pub fn access_level(&self) -> AccessLevel {
        AccessLevel::from(self.agent.clearance)
    }
}

impl ClearanceHolder for Identity {
    fn clearance(&self) -> Clearance {
        self.agent.clearance
    }
}

/// Pull the raw session token from request headers (cookie first)
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let cookie = headers.get(COOKIE).and_then(|v| v.to_str().ok());
    if let Some(token) = extract_token_from_cookie(cookie, SESSION_COOKIE) {
        return Some(token);
    }
    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    extract_token_from_header(auth)
}

/// Resolve the caller, or `None` for anonymous / invalid / deleted agents.
pub async fn resolve_identity(
    headers: &HeaderMap,
    jwt: &JwtValidator,
    agents: &JsonCollection<Agent>,
) -> Option<Identity> {
    let token = token_from_headers(headers)?;
    let result = jwt.verify_token(token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            debug!("Rejected session token: {}", result.error.unwrap_or_default());
            return None;
        }
    };

    match agents.get(&claims.sub).await {
        Some(agent) => Some(Identity { agent }),
        None => {
            debug!("Session for unknown agent {}", claims.sub);
            None
        }
    }
}

/// `Set-Cookie` value for a new session
pub fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenInput;
    use crate::db::MemoryStorage;
    use hyper::header::HeaderValue;
    use std::sync::Arc;

    async fn roster() -> JsonCollection<Agent> {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .insert(
                "agents.json",
                r#"[{"id":"003","username":"wren","name":"Wren Adair","clearance":"Restricted"}]"#,
            )
            .await;
        JsonCollection::load("agents.json", storage).await.unwrap()
    }

    fn token_for(jwt: &JwtValidator, id: &str, clearance: Clearance) -> String {
        jwt.generate_token(TokenInput {
            agent_id: id.into(),
            username: "wren".into(),
            clearance,
        })
        .unwrap()
        .0
    }

    #[tokio::test]
    async fn test_cookie_identity_uses_stored_clearance() {
        let jwt = JwtValidator::new_dev(60);
        let agents = roster().await;
        // Token claims Redline, roster says Restricted
        let token = token_for(&jwt, "3", Clearance::Redline);

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );

        let identity = resolve_identity(&headers, &jwt, &agents).await.unwrap();
        assert_eq!(identity.clearance(), Clearance::Restricted);
        assert_eq!(identity.display_name(), "Wren Adair");
        assert_eq!(identity.access_level(), AccessLevel::Restricted);
    }

    #[tokio::test]
    async fn test_bearer_fallback_and_unknown_agent() {
        let jwt = JwtValidator::new_dev(60);
        let agents = roster().await;

        let mut headers = HeaderMap::new();
        let token = token_for(&jwt, "003", Clearance::Restricted);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert!(resolve_identity(&headers, &jwt, &agents).await.is_some());

        let ghost = token_for(&jwt, "99", Clearance::Redline);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", ghost)).unwrap(),
        );
        assert!(resolve_identity(&headers, &jwt, &agents).await.is_none());

        assert!(resolve_identity(&HeaderMap::new(), &jwt, &agents).await.is_none());
    }

    #[test]
    fn test_cookie_strings() {
        let cookie = session_cookie("abc", 28800, true);
        assert!(cookie.starts_with("archive_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
