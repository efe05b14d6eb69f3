//! Agent roster schema
//!
//! Agents carry the credentials and clearance the guard decides on.

use archive_clearance::{Clearance, ClearanceHolder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::{de_clearance, de_string_id, de_text};
use crate::db::collection::StoredRecord;
use crate::db::normalize_id;

/// File name for the roster
pub const AGENT_COLLECTION: &str = "agents.json";

/// Agent record as stored
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(deserialize_with = "de_string_id")]
    pub id: String,

    #[serde(default, deserialize_with = "de_text")]
    pub name: String,

    #[serde(default, deserialize_with = "de_text")]
    pub username: String,

    /// Argon2 PHC string (legacy rosters may hold plaintext)
    #[serde(default, deserialize_with = "de_text")]
    pub password: String,

    #[serde(default, deserialize_with = "de_text")]
    pub rank: String,

    /// Unknown stored values read as the lowest clearance
    #[serde(default, deserialize_with = "de_clearance")]
    pub clearance: Clearance,

    #[serde(default, deserialize_with = "de_text")]
    pub created_by: String,

    #[serde(default, deserialize_with = "de_text")]
    pub created_at: String,

    #[serde(default, deserialize_with = "de_text")]
    pub last_active: String,

    /// Pass-through roleplay fields (badge number, call sign, unit, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Agent {
    /// Name shown in `created_by` / `updated_by` snapshots
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.username
        } else {
            &self.name
        }
    }

    /// Outward view, without the credential
    pub fn view(&self) -> AgentView<'_> {
        AgentView {
            id: &self.id,
            name: &self.name,
            username: &self.username,
            rank: &self.rank,
            clearance: self.clearance,
            created_by: &self.created_by,
            created_at: &self.created_at,
            last_active: &self.last_active,
            extra: &self.extra,
        }
    }
}

impl ClearanceHolder for Agent {
    fn clearance(&self) -> Clearance {
        self.clearance
    }
}

impl StoredRecord for Agent {
    fn key(&self) -> String {
        normalize_id(&self.id)
    }
}

/// Public agent view: every field except the password
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AgentView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub username: &'a str,
    pub rank: &'a str,
    pub clearance: Clearance,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub last_active: &'a str,
    #[serde(flatten)]
    pub extra: &'a Map<String, Value>,
}

/// Field ranks an agent may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRank {
    Recruit,
    FieldAgent,
    SeniorAgent,
    Handler,
    StationChief,
    Director,
}

impl AgentRank {
    pub const ALL: [AgentRank; 6] = [
        AgentRank::Recruit,
        AgentRank::FieldAgent,
        AgentRank::SeniorAgent,
        AgentRank::Handler,
        AgentRank::StationChief,
        AgentRank::Director,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRank::Recruit => "Recruit",
            AgentRank::FieldAgent => "Field Agent",
            AgentRank::SeniorAgent => "Senior Agent",
            AgentRank::Handler => "Handler",
            AgentRank::StationChief => "Station Chief",
            AgentRank::Director => "Director",
        }
    }

    /// Case-insensitive, tolerant of `_`/`-` in place of spaces
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted: String = raw
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(&wanted))
    }
}

impl fmt::Display for AgentRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
