//! Configuration for the Archive
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Local front-end origins allowed by default (Vite dev server and preview).
pub const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:5173,http://127.0.0.1:5173,http://localhost:4173,http://127.0.0.1:4173";

/// Archive - clearance-gated dossier and intel record service
#[derive(Parser, Debug, Clone)]
#[command(name = "archive")]
#[command(about = "Clearance-gated dossier and intel record service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Directory holding agents.json, people.json and inteldata.json
    #[arg(long, env = "ARCHIVE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Secret for session token signing (required outside dev mode)
    #[arg(long, env = "ARCHIVE_SECRET_KEY")]
    pub jwt_secret: Option<String>,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECONDS", default_value = "28800")]
    pub session_ttl_seconds: u64,

    /// Enable development mode (insecure default secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Comma-separated list of origins allowed to make credentialed requests
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ALLOWED_ORIGINS)]
    pub allowed_origins: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Append audit events as JSON lines to this file
    #[arg(long, env = "AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Username for the administrator created when the roster is empty
    #[arg(long, env = "BOOTSTRAP_USERNAME")]
    pub bootstrap_username: Option<String>,

    /// Password for the bootstrap administrator
    #[arg(long, env = "BOOTSTRAP_PASSWORD")]
    pub bootstrap_password: Option<String>,

    /// Mark the session cookie Secure (serve over HTTPS)
    #[arg(long, env = "SECURE_COOKIES", default_value = "false")]
    pub secure_cookies: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Rewrite people and intel files onto the canonical access-level scale
    MigrateAccessLevels,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    /// Parsed origin allow-list
    pub fn origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Bootstrap credentials, when both halves are configured
    pub fn bootstrap_credentials(&self) -> Option<(&str, &str)> {
        match (&self.bootstrap_username, &self.bootstrap_password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => Some((u.trim(), p)),
            _ => None,
        }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => {
                    return Err("ARCHIVE_SECRET_KEY is required outside dev mode".to_string())
                }
                Some(s) if s.len() < 32 => {
                    return Err("ARCHIVE_SECRET_KEY must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.origin_list().is_empty() {
            return Err("ALLOWED_ORIGINS must name at least one origin".to_string());
        }

        if self.session_ttl_seconds == 0 {
            return Err("SESSION_TTL_SECONDS must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["archive"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.listen.to_string(), "127.0.0.1:8000");
        assert_eq!(args.session_ttl_seconds, 28800);
        assert_eq!(args.origin_list().len(), 4);
        assert_eq!(args.command(), Command::Serve);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_secret_required_outside_dev_mode() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "short"]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "a-secret-that-is-at-least-32-characters-long"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_empty_origin_list_rejected() {
        let args = parse(&["--dev-mode", "--allowed-origins", " , "]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_migrate_subcommand() {
        let args = parse(&["--dev-mode", "migrate-access-levels"]);
        assert_eq!(args.command(), Command::MigrateAccessLevels);
    }

    #[test]
    fn test_bootstrap_needs_both_halves() {
        let args = parse(&["--dev-mode", "--bootstrap-username", "director"]);
        assert!(args.bootstrap_credentials().is_none());

        let args = parse(&[
            "--dev-mode",
            "--bootstrap-username",
            "director",
            "--bootstrap-password",
            "hunter2",
        ]);
        assert_eq!(args.bootstrap_credentials(), Some(("director", "hunter2")));
    }
}
