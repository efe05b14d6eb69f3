//! Intel report schema

use archive_clearance::{
    normalize_access_level, resolve_record_level, AccessLevel, Classified, HIGH_PRIORITY_FLAG,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{de_int_id, de_list, de_opt_text, de_text, has_flag, reconcile_priority, set_flag, GatedRecord};
use crate::db::collection::StoredRecord;

/// File name for intel reports
pub const INTEL_COLLECTION: &str = "inteldata.json";

/// Intel report as stored
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct IntelReport {
    #[serde(deserialize_with = "de_int_id")]
    pub id: i64,

    #[serde(default, deserialize_with = "de_text")]
    pub title: String,
    #[serde(default, deserialize_with = "de_text")]
    pub summary: String,

    // Evidence
    #[serde(default, deserialize_with = "de_text")]
    pub source: String,
    #[serde(default, deserialize_with = "de_text")]
    pub collection_method: String,
    #[serde(default, deserialize_with = "de_text")]
    pub classification: String,
    #[serde(default, deserialize_with = "de_text")]
    pub blackmail_material: String,

    // Linkage (names, not ids)
    #[serde(default, deserialize_with = "de_list")]
    pub linked_persons: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub linked_reports: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub linked_organizations: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub linked_operations: Vec<String>,

    // Operational
    #[serde(default, deserialize_with = "de_text")]
    pub operation_code: String,
    #[serde(default, deserialize_with = "de_text")]
    pub status: String,

    // Metadata
    #[serde(default, deserialize_with = "de_text")]
    pub created_by: String,
    #[serde(default, deserialize_with = "de_text")]
    pub last_updated: String,
    #[serde(default, deserialize_with = "de_text")]
    pub updated_by: String,
    #[serde(default, deserialize_with = "de_text")]
    pub access_level: String,
    #[serde(default, deserialize_with = "de_list")]
    pub internal_flags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub high_priority_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IntelReport {
    pub fn is_high_priority(&self) -> bool {
        has_flag(&self.internal_flags, HIGH_PRIORITY_FLAG)
    }

    pub fn set_priority(&mut self, enabled: bool) -> bool {
        let changed = set_flag(&mut self.internal_flags, HIGH_PRIORITY_FLAG, enabled);
        reconcile_priority(&self.internal_flags, &mut self.high_priority_at);
        changed
    }

    pub fn reconcile_priority(&mut self) {
        reconcile_priority(&self.internal_flags, &mut self.high_priority_at);
    }
}

impl Classified for IntelReport {
    /// Stored level, raised to whatever the classification label implies
    fn required_level(&self) -> AccessLevel {
        let stored = resolve_record_level(&self.access_level);
        match AccessLevel::from_classification(&self.classification) {
            Some(implied) => stored.max(implied),
            None => stored,
        }
    }
}

impl GatedRecord for IntelReport {
    const GATED_FIELDS: &'static [&'static str] = &[
        "source",
        "collection_method",
        "blackmail_material",
        "internal_flags",
        "high_priority_at",
    ];
}

impl StoredRecord for IntelReport {
    fn key(&self) -> String {
        self.id.to_string()
    }

    fn canonicalize(&mut self) -> bool {
        let mut changed = false;
        if let Some(level) = normalize_access_level(&self.access_level) {
            self.access_level = level;
            changed = true;
        }
        let before = self.high_priority_at.is_some();
        self.reconcile_priority();
        changed || before != self.high_priority_at.is_some()
    }
}
