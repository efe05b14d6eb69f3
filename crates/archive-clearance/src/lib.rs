//! Archive Clearance
//!
//! The clearance model and record authorization guard for the Archive.
//! Linked by the server (authoritative enforcement) and by clients (UX only:
//! disabling controls, rendering redaction markers).
//!
//! ## Scales
//!
//! 1. **Clearance** - an agent's privilege tier (`Minimal` .. `Redline`)
//! 2. **AccessLevel** - a record's sensitivity (`minimal` .. `redline`, seven tiers)
//! 3. **ViewerTier** - the simplified UI role (`public` .. `omega`, four tiers)
//!
//! The three scales are independent enumerations. They are only ever compared
//! through the explicit projections in [`clearance`] and [`legacy`].
//!
//! ## Usage
//!
//! ```
//! use archive_clearance::{can_enter_route, Clearance, RouteDecision, Surface};
//!
//! struct Agent(Clearance);
//! impl archive_clearance::ClearanceHolder for Agent {
//!     fn clearance(&self) -> Clearance { self.0 }
//! }
//!
//! let agent = Agent(Clearance::Operational);
//! assert_eq!(
//!     can_enter_route(Some(&agent), Surface::IntelFiles.required_clearance()),
//!     RouteDecision::Allow
//! );
//! assert_eq!(
//!     can_enter_route::<Agent>(None, Clearance::Minimal),
//!     RouteDecision::RedirectToLogin
//! );
//! ```

pub mod clearance;
pub mod guard;
pub mod legacy;
pub mod redaction;

pub use clearance::{is_authorized, AccessLevel, Clearance, Ranked, UnknownLevel, ViewerTier};
pub use guard::{
    can_administer, can_enter_route, can_view_legacy_evidence, can_view_sensitive_fields,
    Capabilities, Classified, ClearanceHolder, ResourceKind, RouteDecision, Surface,
};
pub use legacy::{normalize_access_level, resolve_record_level, LegacyAccess};
pub use redaction::{Gated, Redaction};

/// Tag that marks a record as urgent on the priority summary.
pub const HIGH_PRIORITY_FLAG: &str = "High Priority";

/// Tag that raises a person's effective access level to `restricted`.
pub const PERSON_OF_INTEREST_FLAG: &str = "Person of Interest";
