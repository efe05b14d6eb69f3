//! Person dossier schema

use archive_clearance::{
    normalize_access_level, resolve_record_level, AccessLevel, Classified, HIGH_PRIORITY_FLAG,
    PERSON_OF_INTEREST_FLAG,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{de_int_id, de_list, de_opt_text, de_text, has_flag, reconcile_priority, set_flag, GatedRecord};
use crate::db::collection::StoredRecord;

/// File name for person dossiers
pub const PERSON_COLLECTION: &str = "people.json";

/// Person dossier as stored
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Person {
    #[serde(deserialize_with = "de_int_id")]
    pub id: i64,

    // Identity
    #[serde(default, deserialize_with = "de_text")]
    pub full_name: String,
    #[serde(default, deserialize_with = "de_list")]
    pub known_aliases: Vec<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub dob: String,
    #[serde(default, deserialize_with = "de_text")]
    pub gender: String,
    #[serde(default, deserialize_with = "de_text")]
    pub nationality: String,
    #[serde(default, deserialize_with = "de_text")]
    pub current_address: String,
    #[serde(default, deserialize_with = "de_text")]
    pub image_url: String,

    // Affiliation
    #[serde(default, deserialize_with = "de_text")]
    pub gang_affiliation: String,
    #[serde(default, deserialize_with = "de_list")]
    pub known_associates: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub organization_ties: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub recent_contacts: Vec<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub suspected_informant: String,

    // Tracking
    #[serde(default, deserialize_with = "de_text")]
    pub last_known_location: String,
    #[serde(default, deserialize_with = "de_list")]
    pub known_vehicles: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub radio_frequencies: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub tracked_devices: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub recent_movements: Vec<String>,

    // Sensitive evidence
    #[serde(default, deserialize_with = "de_list")]
    pub cctv_snapshots: Vec<String>,
    #[serde(default, deserialize_with = "de_list")]
    pub intercepted_audio: Vec<String>,
    #[serde(default, deserialize_with = "de_text")]
    pub blackmail_material: String,
    #[serde(default, deserialize_with = "de_text")]
    pub personality_notes: String,
    #[serde(default, deserialize_with = "de_list")]
    pub behavioral_patterns: Vec<String>,

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
    #[serde(default, deserialize_with = "de_list")]
    pub linked_reports: Vec<String>,
    #[serde(
        default,
        deserialize_with = "de_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub high_priority_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Person {
    pub fn is_high_priority(&self) -> bool {
        has_flag(&self.internal_flags, HIGH_PRIORITY_FLAG)
    }

    pub fn is_person_of_interest(&self) -> bool {
        has_flag(&self.internal_flags, PERSON_OF_INTEREST_FLAG)
    }

    /// Toggle the High Priority tag and its timestamp together.
    pub fn set_priority(&mut self, enabled: bool) -> bool {
        let changed = set_flag(&mut self.internal_flags, HIGH_PRIORITY_FLAG, enabled);
        reconcile_priority(&self.internal_flags, &mut self.high_priority_at);
        changed
    }

    pub fn reconcile_priority(&mut self) {
        reconcile_priority(&self.internal_flags, &mut self.high_priority_at);
    }

    /// Case-insensitive substring match. Gated fields take part only when
    /// `include_gated` is set, so hits never reveal hidden content.
    pub fn matches(&self, query: &str, include_gated: bool) -> bool {
        let q = query.to_lowercase();
        let id = self.id.to_string();

        let mut fields: Vec<&str> = vec![
            id.as_str(),
            self.full_name.as_str(),
            self.dob.as_str(),
            self.gender.as_str(),
            self.nationality.as_str(),
            self.current_address.as_str(),
            self.gang_affiliation.as_str(),
            self.suspected_informant.as_str(),
            self.created_by.as_str(),
            self.access_level.as_str(),
        ];
        fields.extend(self.known_aliases.iter().map(String::as_str));
        fields.extend(self.known_associates.iter().map(String::as_str));
        fields.extend(self.organization_ties.iter().map(String::as_str));
        fields.extend(self.recent_contacts.iter().map(String::as_str));

        if include_gated {
            fields.push(self.blackmail_material.as_str());
            fields.extend(self.internal_flags.iter().map(String::as_str));
        }

        fields.iter().any(|f| f.to_lowercase().contains(&q))
    }

    /// Whether `name` refers to this person (full name or an alias)
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        !name.is_empty()
            && (self.full_name.trim().eq_ignore_ascii_case(name)
                || self
                    .known_aliases
                    .iter()
                    .any(|a| a.trim().eq_ignore_ascii_case(name)))
    }
}

impl Classified for Person {
    /// Stored level, raised to `restricted` for persons of interest
    fn required_level(&self) -> AccessLevel {
        let stored = resolve_record_level(&self.access_level);
        if self.is_person_of_interest() {
            stored.max(AccessLevel::Restricted)
        } else {
            stored
        }
    }
}

impl GatedRecord for Person {
    const GATED_FIELDS: &'static [&'static str] = &[
        "cctv_snapshots",
        "intercepted_audio",
        "blackmail_material",
        "personality_notes",
        "behavioral_patterns",
        "internal_flags",
        "linked_reports",
        "high_priority_at",
    ];
}

impl StoredRecord for Person {
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
