//! Audit trail
//!
//! Every authorization denial, login attempt and record mutation becomes an
//! [`AuditEvent`]. Events are always emitted as `tracing` events on the
//! `archive::audit` target and, when a file is configured, appended as JSONL.

use archive_clearance::Clearance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LoginSucceeded,
    LoginFailed,
    Logout,
    /// Guarded route refused for lack of identity
    Unauthenticated,
    /// Guarded route or mutation refused for lack of clearance
    AccessDenied,
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
    PriorityChanged,
    AgentCreated,
    AgentUpdated,
    AgentDeleted,
}

/// A single audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique id for correlating file entries with log lines
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Acting agent id (if authenticated)
    pub agent_id: Option<String>,
    /// Acting agent username, or the attempted username for logins
    pub username: Option<String>,
    /// Clearance of the acting agent at the time of the event
    pub clearance: Option<Clearance>,
    /// Route or operation name
    pub operation: Option<String>,
    /// Affected record ("people/12", "intel/4", "agents/3")
    pub target: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            agent_id: None,
            username: None,
            clearance: None,
            operation: None,
            target: None,
        }
    }

    /// Attach the acting agent
    pub fn with_actor(mut self, agent_id: &str, username: &str, clearance: Clearance) -> Self {
        self.agent_id = Some(agent_id.to_string());
        self.username = Some(username.to_string());
        self.clearance = Some(clearance);
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn is_denial(&self) -> bool {
        matches!(
            self.event_type,
            EventType::LoginFailed | EventType::Unauthenticated | EventType::AccessDenied
        )
    }
}

/// Audit logger that mirrors events to tracing and optionally a JSONL file
#[derive(Clone, Default)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
}

#[derive(Default)]
struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Record an audit event
    pub async fn log(&self, event: AuditEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        if event.is_denial() {
            warn!(target: "archive::audit", event = %jsonl);
        } else {
            info!(target: "archive::audit", event = %jsonl);
        }

        let mut inner = self.inner.lock().await;
        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Log a login attempt
    pub async fn log_login(&self, username: &str, success: bool) {
        let event_type = if success {
            EventType::LoginSucceeded
        } else {
            EventType::LoginFailed
        };
        self.log(AuditEvent::new(event_type).with_username(username))
            .await;
    }
}
