//! End-to-end tests for the guarded API
//!
//! Each test seeds a temporary data directory, builds the application state
//! the same way `main` does and drives requests through `handle_request`.

use bytes::Bytes;
use clap::Parser;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE, COOKIE, ORIGIN, SET_COOKIE};
use hyper::{HeaderMap, Method, Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use archive::auth::{hash_password, TokenInput, SESSION_COOKIE};
use archive::config::Args;
use archive::db::Database;
use archive::logging::AuditLogger;
use archive::server::{handle_request, AppState};
use archive_clearance::Clearance;

struct Harness {
    dir: TempDir,
    state: AppState,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn write(dir: &TempDir, name: &str, value: Value) {
    std::fs::write(dir.path().join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn seed(dir: &TempDir) {
    write(
        dir,
        "agents.json",
        json!([
            { "id": "1", "name": "Ada Vance", "username": "director",
              "password": hash_password("redline-pass").unwrap(),
              "rank": "Director", "clearance": "Redline" },
            { "id": "2", "name": "Brook Hale", "username": "handler",
              "password": hash_password("ts-pass").unwrap(),
              "rank": "Handler", "clearance": "TopSecret" },
            { "id": "3", "name": "Cass Orin", "username": "field",
              "password": hash_password("op-pass").unwrap(),
              "rank": "Field Agent", "clearance": "Operational" },
            { "id": "004", "name": "Dell Rowe", "username": "rookie",
              "password": "plain-legacy",
              "rank": "Recruit", "clearance": "Minimal" }
        ]),
    );
    write(
        dir,
        "people.json",
        json!([
            { "id": 1, "full_name": "Marco Bellini", "access_level": "public",
              "blackmail_material": "ledger photos", "created_by": "Cass Orin" },
            { "id": 2, "full_name": "Sofia Marchetti", "known_aliases": ["The Widow"],
              "access_level": "topsecret", "blackmail_material": "offshore accounts",
              "internal_flags": ["High Priority"], "high_priority_at": "2026-01-01T00:00:00Z",
              "created_by": "Ada Vance" },
            { "id": 3, "full_name": "Luca Romano", "access_level": "minimal",
              "internal_flags": ["Person of Interest"], "created_by": "Brook Hale" }
        ]),
    );
    write(
        dir,
        "inteldata.json",
        json!({ "results": [
            { "id": 1, "title": "Dock shipments", "access_level": "operational",
              "source": "harbour informant", "linked_persons": ["The Widow", "Ghost Rider"],
              "internal_flags": ["High Priority"], "high_priority_at": "2026-02-01T00:00:00Z",
              "created_by": "Cass Orin" },
            { "id": 2, "title": "Vault schematics", "access_level": "redline",
              "source": "inside man", "created_by": "Ada Vance" }
        ]}),
    );
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir);

    let data_dir = dir.path().to_string_lossy().to_string();
    let audit_path = dir.path().join("audit.jsonl");
    let args = Args::try_parse_from([
        "archive",
        "--dev-mode",
        "--data-dir",
        data_dir.as_str(),
        "--allowed-origins",
        "http://localhost:5173",
    ])
    .unwrap();

    let db = Database::open(dir.path()).await.unwrap();
    let audit = AuditLogger::new();
    audit.init_file(audit_path).await.unwrap();
    let state = AppState::new(args, db, audit).unwrap();
    Harness { dir, state }
}

impl Harness {
    fn token(&self, agent_id: &str, username: &str, clearance: Clearance) -> String {
        let (token, _) = self
            .state
            .jwt
            .generate_token(TokenInput {
                agent_id: agent_id.into(),
                username: username.into(),
                clearance,
            })
            .unwrap();
        token
    }

    fn director(&self) -> String {
        self.token("1", "director", Clearance::Redline)
    }

    fn handler(&self) -> String {
        self.token("2", "handler", Clearance::TopSecret)
    }

    fn field(&self) -> String {
        self.token("3", "field", Clearance::Operational)
    }

    fn rookie(&self) -> String {
        self.token("4", "rookie", Clearance::Minimal)
    }

    async fn send(&self, req: Request<Full<Bytes>>) -> Reply {
        let response = handle_request(&self.state, req).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn call(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(value.to_string())
            }
            None => Bytes::new(),
        };
        self.send(builder.body(Full::new(body)).unwrap()).await
    }

    fn audit_lines(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("audit.jsonl")).unwrap_or_default()
    }
}

fn results(reply: &Reply) -> &Vec<Value> {
    reply.body["results"].as_array().unwrap()
}

fn find<'a>(items: &'a [Value], id: i64) -> &'a Value {
    items.iter().find(|v| v["id"] == id).unwrap()
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_sets_cookie_and_session_works() {
    let h = harness().await;

    let reply = h
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "Director", "password": "redline-pass" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["user"]["clearance"], "Redline");
    assert!(reply.body["user"].get("password").is_none());
    assert_eq!(reply.body["capabilities"]["canAdministerAgents"], true);

    let cookie = reply.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
    assert!(cookie.contains("HttpOnly"));

    // Replay the cookie on /api/me
    let pair = cookie.split(';').next().unwrap().to_string();
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/me")
        .header(COOKIE, pair)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let me = h.send(req).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["username"], "director");
    assert_eq!(me.body["viewerTier"], "omega");
}

#[tokio::test]
async fn test_login_failures() {
    let h = harness().await;

    let missing = h
        .call(Method::POST, "/api/login", None, Some(json!({ "username": "director" })))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let wrong = h
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "director", "password": "nope" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["code"], "UNAUTHORIZED");

    let unknown = h
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "ghost", "password": "x" })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    assert!(h.audit_lines().contains("login_failed"));
}

#[tokio::test]
async fn test_legacy_password_is_upgraded_on_login() {
    let h = harness().await;

    let reply = h
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "rookie", "password": "plain-legacy" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let stored = std::fs::read_to_string(h.dir.path().join("agents.json")).unwrap();
    assert!(!stored.contains("plain-legacy"));

    // Still logs in after the upgrade
    let again = h
        .call(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "username": "rookie", "password": "plain-legacy" })),
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let h = harness().await;
    let token = h.field();

    let reply = h.call(Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let cookie = reply.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_deleted_agent_loses_access() {
    let h = harness().await;
    let field = h.field();

    assert_eq!(h.call(Method::GET, "/api/me", Some(&field), None).await.status, StatusCode::OK);

    let deleted = h
        .call(Method::DELETE, "/api/agents/3", Some(&h.director()), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);

    // Token is still validly signed, but the identity is gone
    let reply = h.call(Method::GET, "/api/me", Some(&field), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demotion_applies_to_existing_sessions() {
    let h = harness().await;
    let handler = h.handler();

    assert_eq!(
        h.call(Method::GET, "/api/agents", Some(&handler), None).await.status,
        StatusCode::OK
    );

    let demoted = h
        .call(
            Method::PUT,
            "/api/agents/2",
            Some(&h.director()),
            Some(json!({ "clearance": "Restricted" })),
        )
        .await;
    assert_eq!(demoted.status, StatusCode::OK);

    let reply = h.call(Method::GET, "/api/agents", Some(&handler), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Route guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_anonymous_gets_401_and_low_clearance_gets_403() {
    let h = harness().await;

    let anon = h.call(Method::GET, "/api/intel", None, None).await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let rookie = h.call(Method::GET, "/api/intel", Some(&h.rookie()), None).await;
    assert_eq!(rookie.status, StatusCode::FORBIDDEN);
    assert_eq!(rookie.body["code"], "FORBIDDEN");

    let field = h.call(Method::GET, "/api/intel", Some(&h.field()), None).await;
    assert_eq!(field.status, StatusCode::OK);

    let garbage = h.call(Method::GET, "/api/all", Some("not-a-token"), None).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);

    let audit = h.audit_lines();
    assert!(audit.contains("unauthenticated"));
    assert!(audit.contains("access_denied"));
}

#[tokio::test]
async fn test_access_decision_endpoint() {
    let h = harness().await;

    let anon = h.call(Method::GET, "/api/access/intel", None, None).await;
    assert_eq!(anon.status, StatusCode::OK);
    assert_eq!(anon.body["decision"], "redirectToLogin");
    assert_eq!(anon.body["requires"], "Operational");

    let rookie = h
        .call(Method::GET, "/api/access/persons-of-interest", Some(&h.rookie()), None)
        .await;
    assert_eq!(rookie.body["decision"], "redirectToHome");

    let director = h
        .call(Method::GET, "/api/access/agents-admin", Some(&h.director()), None)
        .await;
    assert_eq!(director.body["decision"], "allow");

    let handler = h
        .call(Method::GET, "/api/access/agents-admin", Some(&h.handler()), None)
        .await;
    assert_eq!(handler.body["decision"], "redirectToHome");

    let unknown = h.call(Method::GET, "/api/access/vault", None, None).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let h = harness().await;
    let reply = h.call(Method::GET, "/api/nowhere", Some(&h.director()), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Redaction and search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_listing_redacts_per_viewer() {
    let h = harness().await;

    let rookie = h.call(Method::GET, "/api/all", Some(&h.rookie()), None).await;
    assert_eq!(rookie.status, StatusCode::OK);
    let people = results(&rookie);
    assert_eq!(people.len(), 3);

    // Legacy "public" reads as minimal, so the rookie sees it in full
    let marco = find(people, 1);
    assert_eq!(marco["blackmail_material"], "ledger photos");
    assert_eq!(marco["access_level"], "minimal");

    let sofia = find(people, 2);
    assert_eq!(sofia["full_name"], "Sofia Marchetti");
    assert_eq!(
        sofia["blackmail_material"],
        json!({ "redacted": true, "requires": "topsecret" })
    );
    assert_eq!(sofia["internal_flags"]["redacted"], true);
    assert_eq!(sofia["high_priority_at"]["redacted"], true);

    // Person of interest bumps to restricted
    let luca = find(people, 3);
    assert_eq!(luca["internal_flags"]["requires"], "restricted");

    let director = h.call(Method::GET, "/api/all", Some(&h.director()), None).await;
    let sofia = find(results(&director), 2);
    assert_eq!(sofia["blackmail_material"], "offshore accounts");
    assert_eq!(sofia["internal_flags"], json!(["High Priority"]));
}

#[tokio::test]
async fn test_search_does_not_leak_gated_matches() {
    let h = harness().await;
    let query = json!({ "query": "OFFSHORE" });

    let rookie = h
        .call(Method::POST, "/api/search", Some(&h.rookie()), Some(query.clone()))
        .await;
    assert_eq!(rookie.status, StatusCode::OK);
    assert!(results(&rookie).is_empty());

    let handler = h
        .call(Method::POST, "/api/search", Some(&h.handler()), Some(query))
        .await;
    assert_eq!(results(&handler).len(), 1);
    assert_eq!(results(&handler)[0]["id"], 2);

    // Aliases are public
    let alias = h
        .call(
            Method::POST,
            "/api/search",
            Some(&h.rookie()),
            Some(json!({ "query": "widow" })),
        )
        .await;
    assert_eq!(results(&alias).len(), 1);

    let empty = h
        .call(Method::POST, "/api/search", Some(&h.rookie()), Some(json!({ "query": "  " })))
        .await;
    assert!(results(&empty).is_empty());
}

#[tokio::test]
async fn test_persons_of_interest_respects_flag_visibility() {
    let h = harness().await;

    let rookie = h
        .call(Method::GET, "/api/persons-of-interest", Some(&h.rookie()), None)
        .await;
    assert_eq!(rookie.status, StatusCode::FORBIDDEN);

    let field = h
        .call(Method::GET, "/api/persons-of-interest", Some(&h.field()), None)
        .await;
    let ids: Vec<i64> = results(&field).iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![3]);

    let director = h
        .call(Method::GET, "/api/persons-of-interest", Some(&h.director()), None)
        .await;
    let mut ids: Vec<i64> = results(&director).iter().map(|v| v["id"].as_i64().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![2, 3]);
}

// ---------------------------------------------------------------------------
// Record mutation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_person_assigns_id_and_caps_level() {
    let h = harness().await;

    let created = h
        .call(
            Method::POST,
            "/api/create",
            Some(&h.field()),
            Some(json!({ "full_name": "Nico Vale", "access_level": "Operational" })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["person"]["id"], 4);
    assert_eq!(created.body["person"]["created_by"], "Cass Orin");
    assert_eq!(created.body["person"]["access_level"], "operational");

    let above = h
        .call(
            Method::POST,
            "/api/create",
            Some(&h.field()),
            Some(json!({ "full_name": "Too High", "access_level": "redline" })),
        )
        .await;
    assert_eq!(above.status, StatusCode::FORBIDDEN);

    let duplicate = h
        .call(
            Method::POST,
            "/api/create",
            Some(&h.field()),
            Some(json!({ "id": 1, "full_name": "Clash" })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let stored = std::fs::read_to_string(h.dir.path().join("people.json")).unwrap();
    assert!(stored.contains("Nico Vale"));
    assert!(!stored.contains("Too High"));
}

#[tokio::test]
async fn test_update_person_rights() {
    let h = harness().await;

    // The rookie neither created Sofia nor can see her sensitive fields
    let rookie = h
        .call(
            Method::PUT,
            "/api/update/2",
            Some(&h.rookie()),
            Some(json!({ "nationality": "Italian" })),
        )
        .await;
    assert_eq!(rookie.status, StatusCode::FORBIDDEN);

    let handler = h
        .call(
            Method::PUT,
            "/api/update/2",
            Some(&h.handler()),
            Some(json!({ "nationality": "Italian", "id": 99 })),
        )
        .await;
    assert_eq!(handler.status, StatusCode::OK);
    assert_eq!(handler.body["person"]["id"], 2);
    assert_eq!(handler.body["person"]["nationality"], "Italian");
    assert_eq!(handler.body["person"]["updated_by"], "Brook Hale");

    let missing = h
        .call(Method::PUT, "/api/update/404", Some(&h.director()), Some(json!({})))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_creator_loses_flag_writes_when_record_is_raised() {
    let h = harness().await;
    let director = h.director();
    let field = h.field();

    // Marco was created by Cass Orin; the director raises him out of reach
    let raised = h
        .call(
            Method::PUT,
            "/api/update/1",
            Some(&director),
            Some(json!({ "access_level": "redline" })),
        )
        .await;
    assert_eq!(raised.status, StatusCode::OK);

    let toggle = h
        .call(
            Method::POST,
            "/api/people/1/priority",
            Some(&field),
            Some(json!({ "enabled": true })),
        )
        .await;
    assert_eq!(toggle.status, StatusCode::FORBIDDEN);

    let flags = h
        .call(
            Method::PUT,
            "/api/update/1",
            Some(&field),
            Some(json!({ "internal_flags": ["High Priority"] })),
        )
        .await;
    assert_eq!(flags.status, StatusCode::FORBIDDEN);

    // Ungated fields remain writable for the creator
    let plain = h
        .call(
            Method::PUT,
            "/api/update/1",
            Some(&field),
            Some(json!({ "nationality": "Maltese" })),
        )
        .await;
    assert_eq!(plain.status, StatusCode::OK);

    let seen = h.call(Method::GET, "/api/all", Some(&director), None).await;
    let marco = find(results(&seen), 1);
    assert_eq!(marco["internal_flags"], json!([]));
    assert!(marco.get("high_priority_at").is_none());
    let audit = h.audit_lines();
    assert!(audit
        .lines()
        .any(|l| l.contains("access_denied") && l.contains("\"people/1\"")));
}

#[tokio::test]
async fn test_creator_loses_intel_flag_writes_when_report_is_raised() {
    let h = harness().await;
    let director = h.director();
    let field = h.field();

    let raised = h
        .call(
            Method::PUT,
            "/api/intel/1",
            Some(&director),
            Some(json!({ "access_level": "redline" })),
        )
        .await;
    assert_eq!(raised.status, StatusCode::OK);

    let toggle = h
        .call(
            Method::POST,
            "/api/intel/1/priority",
            Some(&field),
            Some(json!({ "enabled": false })),
        )
        .await;
    assert_eq!(toggle.status, StatusCode::FORBIDDEN);

    let source = h
        .call(
            Method::PUT,
            "/api/intel/1",
            Some(&field),
            Some(json!({ "source": "rewritten" })),
        )
        .await;
    assert_eq!(source.status, StatusCode::FORBIDDEN);

    let seen = h.call(Method::GET, "/api/intel", Some(&director), None).await;
    let report = find(results(&seen), 1);
    assert_eq!(report["internal_flags"], json!(["High Priority"]));
    assert_eq!(report["source"], "harbour informant");
    let audit = h.audit_lines();
    assert!(audit
        .lines()
        .any(|l| l.contains("access_denied") && l.contains("\"intel/1\"")));
}

#[tokio::test]
async fn test_priority_toggle_and_summary() {
    let h = harness().await;

    let flagged = h
        .call(
            Method::POST,
            "/api/people/1/priority",
            Some(&h.field()),
            Some(json!({ "enabled": true })),
        )
        .await;
    assert_eq!(flagged.status, StatusCode::OK);
    assert!(flagged.body["person"]["high_priority_at"].is_string());

    let rookie = h.call(Method::GET, "/api/priority", Some(&h.rookie()), None).await;
    assert_eq!(rookie.status, StatusCode::OK);
    assert_eq!(rookie.body["intelIncluded"], false);
    let ids: Vec<i64> = results(&rookie).iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1]);

    let director = h.call(Method::GET, "/api/priority", Some(&h.director()), None).await;
    assert_eq!(director.body["intelIncluded"], true);
    let items = results(&director);
    assert_eq!(items.len(), 3);
    // Newest stamp first; Marco was flagged just now
    assert_eq!(items[0]["kind"], "person");
    assert_eq!(items[0]["id"], 1);
    assert_eq!(items[1]["kind"], "intel");
    assert_eq!(items[2]["id"], 2);

    let cleared = h
        .call(
            Method::POST,
            "/api/people/1/priority",
            Some(&h.field()),
            Some(json!({ "enabled": false })),
        )
        .await;
    assert!(cleared.body["person"].get("high_priority_at").is_none());
}

#[tokio::test]
async fn test_intel_levels_and_links() {
    let h = harness().await;

    let field = h.call(Method::GET, "/api/intel", Some(&h.field()), None).await;
    let reports = results(&field);
    assert_eq!(find(reports, 1)["source"], "harbour informant");
    assert_eq!(find(reports, 2)["source"]["requires"], "redline");

    let links = h
        .call(Method::GET, "/api/intel/1/links", Some(&h.field()), None)
        .await;
    assert_eq!(links.status, StatusCode::OK);
    assert_eq!(links.body["links"][0]["name"], "The Widow");
    assert_eq!(links.body["links"][0]["personIds"], json!([2]));
    assert_eq!(links.body["dangling"], json!(["Ghost Rider"]));

    let denied = h
        .call(
            Method::DELETE,
            "/api/intel/2",
            Some(&h.handler()),
            None,
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = h
        .call(Method::DELETE, "/api/intel/2", Some(&h.director()), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let remaining = h.call(Method::GET, "/api/intel", Some(&h.director()), None).await;
    assert_eq!(results(&remaining).len(), 1);
}

// ---------------------------------------------------------------------------
// Roster administration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_roster_admin_is_redline_only() {
    let h = harness().await;
    let recruit = json!({
        "name": "Eve Strand", "username": "strand", "password": "pw-1234",
        "rank": "Recruit", "clearance": "Minimal", "callSign": "Kite"
    });

    let handler = h
        .call(Method::POST, "/api/agents", Some(&h.handler()), Some(recruit.clone()))
        .await;
    assert_eq!(handler.status, StatusCode::FORBIDDEN);

    let created = h
        .call(Method::POST, "/api/agents", Some(&h.director()), Some(recruit.clone()))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["agent"]["id"], "5");
    assert_eq!(created.body["agent"]["callSign"], "Kite");
    assert_eq!(created.body["agent"]["createdBy"], "Ada Vance");
    assert!(created.body["agent"].get("password").is_none());

    let duplicate = h
        .call(Method::POST, "/api/agents", Some(&h.director()), Some(recruit))
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let incomplete = h
        .call(
            Method::POST,
            "/api/agents",
            Some(&h.director()),
            Some(json!({ "name": "No Rank", "password": "x" })),
        )
        .await;
    assert_eq!(incomplete.status, StatusCode::BAD_REQUEST);

    // Roster view is TopSecret, ids normalize
    let fetched = h.call(Method::GET, "/api/agents/04", Some(&h.handler()), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["username"], "rookie");
}

#[tokio::test]
async fn test_last_redline_agent_is_protected() {
    let h = harness().await;
    let director = h.director();

    let delete = h.call(Method::DELETE, "/api/agents/1", Some(&director), None).await;
    assert_eq!(delete.status, StatusCode::CONFLICT);

    let demote = h
        .call(
            Method::PUT,
            "/api/agents/1",
            Some(&director),
            Some(json!({ "clearance": "TopSecret" })),
        )
        .await;
    assert_eq!(demote.status, StatusCode::CONFLICT);

    // Once a second Redline exists the first may step down
    let promote = h
        .call(
            Method::PUT,
            "/api/agents/2",
            Some(&director),
            Some(json!({ "clearance": "Redline" })),
        )
        .await;
    assert_eq!(promote.status, StatusCode::OK);

    let demote = h
        .call(
            Method::PUT,
            "/api/agents/1",
            Some(&director),
            Some(json!({ "clearance": "TopSecret" })),
        )
        .await;
    assert_eq!(demote.status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cors_allow_list() {
    let h = harness().await;

    let allowed = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(ORIGIN, "http://localhost:5173")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let reply = h.send(allowed).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );

    let foreign = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(ORIGIN, "https://evil.example")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let reply = h.send(foreign).await;
    assert!(reply.headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/login")
        .header(ORIGIN, "http://localhost:5173")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let reply = h.send(preflight).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_health_reports_record_counts() {
    let h = harness().await;
    let reply = h.call(Method::GET, "/healthz", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["records"]["agents"], 4);
    assert_eq!(reply.body["records"]["people"], 3);
    assert_eq!(reply.body["records"]["intel"], 2);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let h = harness().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/search")
        .header(AUTHORIZATION, format!("Bearer {}", h.rookie()))
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    let reply = h.send(req).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}
