//! Legacy three-tier access labels and the record-side resolver
//!
//! Older person records were labelled `public`, `agent-only` or
//! `handler-only`. The canonical scale is the seven-tier [`AccessLevel`];
//! legacy labels are migrated onto it with a mapping that keeps every
//! clearance's visibility decision unchanged.

use serde::{Deserialize, Serialize};

use crate::clearance::{fold, AccessLevel, ViewerTier};

/// A legacy person-record access label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyAccess {
    Public,
    AgentOnly,
    HandlerOnly,
}

impl LegacyAccess {
    pub const ALL: [LegacyAccess; 3] = [
        LegacyAccess::Public,
        LegacyAccess::AgentOnly,
        LegacyAccess::HandlerOnly,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "public" => Some(LegacyAccess::Public),
            "agentonly" | "agent" => Some(LegacyAccess::AgentOnly),
            "handleronly" | "handler" => Some(LegacyAccess::HandlerOnly),
            _ => None,
        }
    }

    /// Viewer tier the label demanded under the old gating path.
    pub fn required_tier(&self) -> ViewerTier {
        match self {
            LegacyAccess::Public => ViewerTier::Public,
            LegacyAccess::AgentOnly => ViewerTier::Agent,
            LegacyAccess::HandlerOnly => ViewerTier::Handler,
        }
    }

    /// Canonical level this label migrates to.
    pub fn canonical(&self) -> AccessLevel {
        match self {
            LegacyAccess::Public => AccessLevel::Minimal,
            LegacyAccess::AgentOnly => AccessLevel::Restricted,
            LegacyAccess::HandlerOnly => AccessLevel::TopSecret,
        }
    }
}

/// Resolve a stored `access_level` string to the level it enforces.
///
/// - missing or blank: `minimal`
/// - canonical spelling: that level
/// - legacy label: its canonical migration
/// - anything else: `redline`, so corrupt data never widens visibility
pub fn resolve_record_level(raw: &str) -> AccessLevel {
    if raw.trim().is_empty() {
        return AccessLevel::Minimal;
    }
    AccessLevel::parse(raw)
        .or_else(|| LegacyAccess::parse(raw).map(|l| l.canonical()))
        .unwrap_or(AccessLevel::Redline)
}

/// Canonical spelling for a stored `access_level`, or `None` when it is
/// already canonical (or blank).
pub fn normalize_access_level(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let level = resolve_record_level(raw);
    if level.as_str() == raw {
        None
    } else {
        Some(level.as_str().to_string())
    }
}
