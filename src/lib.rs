//! The Archive - clearance-gated dossier and intel record service
//!
//! Agents log in, browse and search person dossiers and intel reports, flag
//! records as High Priority, and (at the top tier) manage the roster.
//! Sensitive fields are gated by the clearance model in `archive-clearance`;
//! this crate is the authoritative enforcement point.
//!
//! ## Services
//!
//! - **Sessions**: argon2 credentials, HS256 session cookies
//! - **Records**: JSON-file collections for agents, people and intel
//! - **Guarded API**: every route resolves the caller and asks the guard
//!   before reading data; hidden fields become redaction markers
//! - **Audit**: denials, logins and mutations as structured events

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ArchiveError, Result};
