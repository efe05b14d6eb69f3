//! Record schemas
//!
//! Each record keeps unknown fields in a flattened `extra` map so files
//! written by other tools survive a round trip.

pub mod agent;
pub mod intel;
pub mod person;

pub use agent::{Agent, AgentRank, AgentView};
pub use intel::IntelReport;
pub use person::Person;

use archive_clearance::{can_view_sensitive_fields, AccessLevel, Classified, Clearance, Redaction};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Records with a fixed set of clearance-gated fields.
pub trait GatedRecord: Serialize + Classified {
    /// JSON keys hidden from viewers below the record's level
    const GATED_FIELDS: &'static [&'static str];

    /// JSON rendering for one viewer. Hidden fields are replaced by a
    /// redaction marker, never dropped.
    fn view_for(&self, viewer: AccessLevel) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if !can_view_sensitive_fields(self, viewer) {
            let marker = serde_json::to_value(Redaction::new(self.required_level()))?;
            if let Value::Object(map) = &mut value {
                for key in Self::GATED_FIELDS {
                    map.insert((*key).to_string(), marker.clone());
                }
            }
        }
        Ok(value)
    }

    /// Whether a JSON payload tries to write any gated field
    fn touches_gated(payload: &serde_json::Map<String, Value>) -> bool {
        Self::GATED_FIELDS.iter().any(|k| payload.contains_key(*k))
    }
}

/// UTC timestamp, second precision, `Z` suffix
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// UTC calendar date
pub fn today() -> String {
    Utc::now().date_naive().to_string()
}

pub fn has_flag(flags: &[String], flag: &str) -> bool {
    flags.iter().any(|f| f.trim().eq_ignore_ascii_case(flag))
}

/// Add or remove a flag. Returns true when the list changed.
pub fn set_flag(flags: &mut Vec<String>, flag: &str, enabled: bool) -> bool {
    let present = has_flag(flags, flag);
    match (present, enabled) {
        (false, true) => {
            flags.push(flag.to_string());
            true
        }
        (true, false) => {
            flags.retain(|f| !f.trim().eq_ignore_ascii_case(flag));
            true
        }
        _ => false,
    }
}

/// Keep a priority timestamp consistent with the flag list.
pub fn reconcile_priority(flags: &[String], stamp: &mut Option<String>) {
    let flagged = has_flag(flags, archive_clearance::HIGH_PRIORITY_FLAG);
    match (flagged, stamp.is_some()) {
        (true, false) => *stamp = Some(now_iso()),
        (false, true) => *stamp = None,
        _ => {}
    }
}

/// A list field that also accepts `null`, a single string, or a
/// comma-delimited string. Other scalars become a one-item list.
pub fn de_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_list(&s),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    })
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A string field that tolerates `null` and scalars.
pub fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Optional text: `null`, blank and non-string values read as absent.
pub fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// Agent clearance; anything unreadable is the lowest tier.
pub fn de_clearance<'de, D>(deserializer: D) -> Result<Clearance, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Clearance::from_str_lossy(&s),
        _ => Clearance::LOWEST,
    })
}

/// Integer id stored as a number or a digit string.
pub fn de_int_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom("id must be an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom("id must be an integer")),
        _ => Err(D::Error::custom("id must be an integer")),
    }
}

/// String id stored as a string or a number.
pub fn de_string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(D::Error::custom("id must be a string or number")),
    }
}
