//! Record authorization guard
//!
//! The single decision point for the Archive. Every function here is total,
//! pure and synchronous: no I/O, no shared state, no panics. Identity is
//! always passed in explicitly by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clearance::{is_authorized, AccessLevel, Clearance, Ranked, ViewerTier};
use crate::legacy::LegacyAccess;

/// Anything that carries an agent clearance.
pub trait ClearanceHolder {
    fn clearance(&self) -> Clearance;
}

impl ClearanceHolder for Clearance {
    fn clearance(&self) -> Clearance {
        *self
    }
}

/// Anything whose sensitive fields are gated by an access level.
pub trait Classified {
    /// Level a viewer must reach to see this record's sensitive fields.
    fn required_level(&self) -> AccessLevel;
}

impl Classified for AccessLevel {
    fn required_level(&self) -> AccessLevel {
        *self
    }
}

/// Outcome of a route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToHome,
}

impl RouteDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RouteDecision::Allow)
    }
}

/// Application surfaces and the clearance each one requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Surface {
    /// Person search and listing
    Search,
    /// Persons flagged as of interest or high priority
    PersonsOfInterest,
    /// Intel reports
    #[serde(rename = "intel")]
    IntelFiles,
    /// Agent roster (read only)
    #[serde(rename = "agents")]
    AgentRoster,
    /// Agent roster administration (create, edit, delete)
    #[serde(rename = "agents-admin")]
    AgentAdmin,
}

impl Surface {
    pub const ALL: [Surface; 5] = [
        Surface::Search,
        Surface::PersonsOfInterest,
        Surface::IntelFiles,
        Surface::AgentRoster,
        Surface::AgentAdmin,
    ];

    pub fn required_clearance(&self) -> Clearance {
        match self {
            Surface::Search => Clearance::Minimal,
            Surface::PersonsOfInterest => Clearance::Restricted,
            Surface::IntelFiles => Clearance::Operational,
            Surface::AgentRoster => Clearance::TopSecret,
            Surface::AgentAdmin => Clearance::Redline,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Surface::Search => "search",
            Surface::PersonsOfInterest => "persons-of-interest",
            Surface::IntelFiles => "intel",
            Surface::AgentRoster => "agents",
            Surface::AgentAdmin => "agents-admin",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Resource kinds that carry administrative (mutating) actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Agents,
    People,
    Intel,
}

/// Decide whether a caller may enter a route.
///
/// Callable before any data fetch; a denial never touches protected data.
pub fn can_enter_route<A>(agent: Option<&A>, required: Clearance) -> RouteDecision
where
    A: ClearanceHolder + ?Sized,
{
    match agent {
        None => RouteDecision::RedirectToLogin,
        Some(a) if is_authorized(a.clearance().rank(), required.rank()) => RouteDecision::Allow,
        Some(_) => RouteDecision::RedirectToHome,
    }
}

/// Decide whether a viewer may see a record's sensitive fields.
///
/// `viewer` is the viewer's position on the record scale, normally
/// `AccessLevel::from(agent.clearance())`.
pub fn can_view_sensitive_fields<R>(record: &R, viewer: AccessLevel) -> bool
where
    R: Classified + ?Sized,
{
    is_authorized(viewer.rank(), record.required_level().rank())
}

/// The four-tier gating path for records still labelled on the legacy
/// three-tier scale.
pub fn can_view_legacy_evidence(record: LegacyAccess, viewer: ViewerTier) -> bool {
    is_authorized(viewer.rank(), record.required_tier().rank())
}

/// Decide whether an agent may create, update or delete resources of a kind.
///
/// Roster administration belongs to `Redline` alone. People and intel follow
/// the clearance of the surface that owns them.
pub fn can_administer<A>(agent: &A, kind: ResourceKind) -> bool
where
    A: ClearanceHolder + ?Sized,
{
    match kind {
        ResourceKind::Agents => agent.clearance() == Clearance::Redline,
        ResourceKind::People => {
            is_authorized(agent.clearance().rank(), Surface::PersonsOfInterest.required_clearance().rank())
        }
        ResourceKind::Intel => {
            is_authorized(agent.clearance().rank(), Surface::IntelFiles.required_clearance().rank())
        }
    }
}

/// Everything a client needs to gate its controls for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub clearance: Clearance,
    pub viewer_tier: ViewerTier,
    pub access_level: AccessLevel,
    /// Surfaces the agent may enter
    pub surfaces: Vec<Surface>,
    /// Surfaces shown but disabled (with the clearance that unlocks them)
    pub locked: Vec<LockedSurface>,
    pub can_administer_agents: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedSurface {
    pub surface: Surface,
    pub requires: Clearance,
}

impl Capabilities {
    pub fn for_agent<A>(agent: &A) -> Self
    where
        A: ClearanceHolder + ?Sized,
    {
        let clearance = agent.clearance();
        let (open, closed): (Vec<Surface>, Vec<Surface>) = Surface::ALL
            .into_iter()
            .partition(|s| can_enter_route(Some(agent), s.required_clearance()).is_allowed());

        Self {
            clearance,
            viewer_tier: ViewerTier::for_clearance(clearance),
            access_level: AccessLevel::from(clearance),
            surfaces: open,
            locked: closed
                .into_iter()
                .map(|surface| LockedSurface {
                    surface,
                    requires: surface.required_clearance(),
                })
                .collect(),
            can_administer_agents: can_administer(agent, ResourceKind::Agents),
        }
    }
}
