//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Bodies are read in full
//! before routing; CORS headers are applied to every response on the way out.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN, VARY,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::Database;
use crate::logging::AuditLogger;
use crate::routes::{self, error_response, ApiRequest, FullBody, MAX_BODY_BYTES};
use crate::types::ArchiveError;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub db: Database,
    pub jwt: JwtValidator,
    pub audit: AuditLogger,
    /// Normalized CORS allow-list
    pub origins: Vec<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, db: Database, audit: AuditLogger) -> Result<Self, ArchiveError> {
        let jwt = match args.jwt_secret.clone() {
            Some(secret) => JwtValidator::new(secret, args.session_ttl_seconds)?,
            None if args.dev_mode => JwtValidator::new_dev(args.session_ttl_seconds),
            None => {
                return Err(ArchiveError::Config(
                    "ARCHIVE_SECRET_KEY is required outside dev mode".into(),
                ))
            }
        };
        let origins = args.origin_list();

        Ok(Self {
            args,
            db,
            jwt,
            audit,
            origins,
            started_at: Instant::now(),
        })
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.origins.iter().any(|o| o == origin)
    }
}

pub async fn run(state: Arc<AppState>) -> Result<(), ArchiveError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Archive listening on {}", state.args.listen);
    info!("CORS origins: {}", state.origins.join(", "));

    if state.args.dev_mode {
        warn!("Development mode enabled - sessions signed with a built-in secret");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move {
                            debug!("[{}] {} {}", addr, req.method(), req.uri().path());
                            Ok::<_, Infallible>(handle_request(&state, req).await)
                        }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Handle one request end to end: CORS, body, routing.
///
/// Generic over the body type so tests can drive it with `Full<Bytes>`.
pub async fn handle_request<B>(state: &AppState, req: Request<B>) -> Response<FullBody>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        let mut response = preflight_response(req.headers());
        apply_cors(state, origin.as_deref(), &mut response);
        return response;
    }

    let (parts, body) = req.into_parts();
    let mut response = match read_body(body).await {
        Ok(body) => {
            let api_req = ApiRequest {
                method: parts.method,
                path: parts.uri.path().to_string(),
                headers: parts.headers,
                body,
            };
            routes::dispatch(state, api_req).await
        }
        Err(err) => error_response(&err),
    };

    apply_cors(state, origin.as_deref(), &mut response);
    response
}

async fn read_body<B>(body: B) -> Result<Bytes, ArchiveError>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    if body.size_hint().lower() > MAX_BODY_BYTES as u64 {
        return Err(ArchiveError::BadRequest("Request body too large".into()));
    }
    let bytes = body
        .collect()
        .await
        .map_err(|e| ArchiveError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(ArchiveError::BadRequest("Request body too large".into()));
    }
    Ok(bytes)
}

/// Echo the origin back when it is on the allow-list. Credentials are
/// enabled, so a wildcard is never sent.
fn apply_cors(state: &AppState, origin: Option<&str>, response: &mut Response<FullBody>) {
    let headers = response.headers_mut();
    headers.append(VARY, HeaderValue::from_static("Origin"));

    let Some(origin) = origin.filter(|o| state.origin_allowed(o)) else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// CORS preflight response
fn preflight_response(request_headers: &HeaderMap) -> Response<FullBody> {
    let allow_headers = request_headers
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOWED_HEADERS));

    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}
