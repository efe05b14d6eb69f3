//! Ordered privilege scales
//!
//! Every scale maps its members onto a non-negative rank (higher = more
//! privileged). Parsing comes in two flavours:
//!
//! - `parse` is strict and returns `None` for anything unrecognized. Used when
//!   validating writes (an agent cannot be created with a made-up clearance).
//! - `from_str_lossy` / `rank_of` are total and fail closed: unknown or missing
//!   input becomes the lowest member of the scale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A member of an ordered privilege scale.
pub trait Ranked {
    fn rank(&self) -> u8;
}

/// `viewer_rank >= required_rank`.
pub fn is_authorized(viewer_rank: u8, required_rank: u8) -> bool {
    viewer_rank >= required_rank
}

/// Error returned by strict `FromStr` parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {scale} level: {value:?}")]
pub struct UnknownLevel {
    pub scale: &'static str,
    pub value: String,
}

/// Lowercase and drop separators so "Top Secret", "top_secret" and
/// "TopSecret" compare equal.
pub(crate) fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

// =============================================================================
// Agent clearance
// =============================================================================

/// An agent's privilege tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(u8)]
pub enum Clearance {
    #[default]
    Minimal = 0,
    Restricted = 1,
    Operational = 2,
    TopSecret = 3,
    Redline = 4,
}

impl Clearance {
    /// All tiers, lowest first.
    pub const ALL: [Clearance; 5] = [
        Clearance::Minimal,
        Clearance::Restricted,
        Clearance::Operational,
        Clearance::TopSecret,
        Clearance::Redline,
    ];

    pub const LOWEST: Clearance = Clearance::Minimal;
    pub const HIGHEST: Clearance = Clearance::Redline;

    pub fn as_str(&self) -> &'static str {
        match self {
            Clearance::Minimal => "Minimal",
            Clearance::Restricted => "Restricted",
            Clearance::Operational => "Operational",
            Clearance::TopSecret => "TopSecret",
            Clearance::Redline => "Redline",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "minimal" => Some(Clearance::Minimal),
            "restricted" => Some(Clearance::Restricted),
            "operational" => Some(Clearance::Operational),
            "topsecret" => Some(Clearance::TopSecret),
            "redline" => Some(Clearance::Redline),
            _ => None,
        }
    }

    pub fn from_str_lossy(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::LOWEST)
    }

    /// Rank of a raw clearance string; unknown input ranks lowest.
    pub fn rank_of(raw: &str) -> u8 {
        Self::from_str_lossy(raw).rank()
    }
}

impl Ranked for Clearance {
    fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Clearance {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownLevel {
            scale: "clearance",
            value: s.to_string(),
        })
    }
}

impl From<String> for Clearance {
    fn from(raw: String) -> Self {
        Self::from_str_lossy(&raw)
    }
}

impl From<Clearance> for String {
    fn from(c: Clearance) -> Self {
        c.as_str().to_string()
    }
}

// =============================================================================
// Record access level
// =============================================================================

/// A record's sensitivity on the canonical seven-tier scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(u8)]
pub enum AccessLevel {
    #[default]
    Minimal = 0,
    Confidential = 1,
    Restricted = 2,
    Classified = 3,
    Operational = 4,
    TopSecret = 5,
    Redline = 6,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 7] = [
        AccessLevel::Minimal,
        AccessLevel::Confidential,
        AccessLevel::Restricted,
        AccessLevel::Classified,
        AccessLevel::Operational,
        AccessLevel::TopSecret,
        AccessLevel::Redline,
    ];

    pub const LOWEST: AccessLevel = AccessLevel::Minimal;
    pub const HIGHEST: AccessLevel = AccessLevel::Redline;

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Minimal => "minimal",
            AccessLevel::Confidential => "confidential",
            AccessLevel::Restricted => "restricted",
            AccessLevel::Classified => "classified",
            AccessLevel::Operational => "operational",
            AccessLevel::TopSecret => "topsecret",
            AccessLevel::Redline => "redline",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "minimal" => Some(AccessLevel::Minimal),
            "confidential" => Some(AccessLevel::Confidential),
            "restricted" => Some(AccessLevel::Restricted),
            "classified" => Some(AccessLevel::Classified),
            "operational" => Some(AccessLevel::Operational),
            "topsecret" => Some(AccessLevel::TopSecret),
            "redline" => Some(AccessLevel::Redline),
            _ => None,
        }
    }

    pub fn from_str_lossy(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::LOWEST)
    }

    /// Rank of a raw access-level string; unknown input ranks lowest.
    ///
    /// This is the viewer-side reading. Record-side resolution of a stored
    /// `access_level` goes through [`crate::resolve_record_level`].
    pub fn rank_of(raw: &str) -> u8 {
        Self::from_str_lossy(raw).rank()
    }

    /// Level implied by an intel report's free-text classification label.
    /// Empty labels imply nothing; unrecognized labels imply `restricted`.
    pub fn from_classification(label: &str) -> Option<Self> {
        if label.trim().is_empty() {
            return None;
        }
        // "Top" covers a label split as "Top / Secret"
        if fold(label) == "top" {
            return Some(AccessLevel::TopSecret);
        }
        Some(Self::parse(label).unwrap_or(AccessLevel::Restricted))
    }
}

impl Ranked for AccessLevel {
    fn rank(&self) -> u8 {
        *self as u8
    }
}

/// Projection of an agent's clearance onto the record scale. The agent tiers
/// land on the record tiers of the same name; `confidential` and `classified`
/// sit between them.
impl From<Clearance> for AccessLevel {
    fn from(c: Clearance) -> Self {
        match c {
            Clearance::Minimal => AccessLevel::Minimal,
            Clearance::Restricted => AccessLevel::Restricted,
            Clearance::Operational => AccessLevel::Operational,
            Clearance::TopSecret => AccessLevel::TopSecret,
            Clearance::Redline => AccessLevel::Redline,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownLevel {
            scale: "access level",
            value: s.to_string(),
        })
    }
}

impl From<String> for AccessLevel {
    fn from(raw: String) -> Self {
        Self::from_str_lossy(&raw)
    }
}

impl From<AccessLevel> for String {
    fn from(l: AccessLevel) -> Self {
        l.as_str().to_string()
    }
}

// =============================================================================
// Viewer tier
// =============================================================================

/// The simplified UI role. Answers "what can this role see", never "what
/// does this record require".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(u8)]
pub enum ViewerTier {
    #[default]
    Public = 0,
    Agent = 1,
    Handler = 2,
    Omega = 3,
}

impl ViewerTier {
    pub const ALL: [ViewerTier; 4] = [
        ViewerTier::Public,
        ViewerTier::Agent,
        ViewerTier::Handler,
        ViewerTier::Omega,
    ];

    pub const LOWEST: ViewerTier = ViewerTier::Public;

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerTier::Public => "public",
            ViewerTier::Agent => "agent",
            ViewerTier::Handler => "handler",
            ViewerTier::Omega => "omega",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold(raw).as_str() {
            "public" => Some(ViewerTier::Public),
            "agent" => Some(ViewerTier::Agent),
            "handler" => Some(ViewerTier::Handler),
            "omega" => Some(ViewerTier::Omega),
            _ => None,
        }
    }

    pub fn from_str_lossy(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::LOWEST)
    }

    pub fn rank_of(raw: &str) -> u8 {
        Self::from_str_lossy(raw).rank()
    }

    /// UI role of an agent with the given clearance.
    pub fn for_clearance(c: Clearance) -> Self {
        match c {
            Clearance::Minimal => ViewerTier::Public,
            Clearance::Restricted | Clearance::Operational => ViewerTier::Agent,
            Clearance::TopSecret => ViewerTier::Handler,
            Clearance::Redline => ViewerTier::Omega,
        }
    }
}

impl Ranked for ViewerTier {
    fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ViewerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ViewerTier {
    fn from(raw: String) -> Self {
        Self::from_str_lossy(&raw)
    }
}

impl From<ViewerTier> for String {
    fn from(t: ViewerTier) -> Self {
        t.as_str().to_string()
    }
}
