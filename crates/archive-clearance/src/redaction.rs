//! Redaction markers
//!
//! A gated field is either its real value or an explicit marker. The marker
//! serializes as `{"redacted": true, "requires": "<level>"}` so a client can
//! tell "access denied" apart from "no data" and show what would unlock it.

use serde::{Deserialize, Serialize};

use crate::clearance::AccessLevel;

/// Placeholder that stands in for a hidden value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redaction {
    pub redacted: bool,
    /// Level that would reveal the value
    pub requires: AccessLevel,
}

impl Redaction {
    pub fn new(requires: AccessLevel) -> Self {
        Self {
            redacted: true,
            requires,
        }
    }
}

/// A field that may have been redacted for the current viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Gated<T> {
    Redacted(Redaction),
    Visible(T),
}

impl<T> Gated<T> {
    /// Keep `value` when `visible`, otherwise replace it with a marker.
    pub fn reveal_if(visible: bool, value: T, requires: AccessLevel) -> Self {
        if visible {
            Gated::Visible(value)
        } else {
            Gated::Redacted(Redaction::new(requires))
        }
    }

    pub fn is_redacted(&self) -> bool {
        matches!(self, Gated::Redacted(_))
    }

    pub fn visible(&self) -> Option<&T> {
        match self {
            Gated::Visible(v) => Some(v),
            Gated::Redacted(_) => None,
        }
    }

    pub fn into_visible(self) -> Option<T> {
        match self {
            Gated::Visible(v) => Some(v),
            Gated::Redacted(_) => None,
        }
    }
}
