//! Record store
//!
//! Three JSON-file collections (agents, people, intel) behind one handle.

pub mod collection;
pub mod schemas;
pub mod storage;

pub use collection::{JsonCollection, StoredRecord};
pub use schemas::{Agent, AgentRank, AgentView, GatedRecord, IntelReport, Person};
pub use storage::{FileStorage, MemoryStorage, Storage};

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::types::ArchiveError;
use schemas::agent::AGENT_COLLECTION;
use schemas::intel::INTEL_COLLECTION;
use schemas::person::PERSON_COLLECTION;

/// Normalize an id for comparison: "001", "1" and 1 are the same id.
pub fn normalize_id(raw: &str) -> String {
    let s = raw.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        let stripped = s.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        s.to_string()
    }
}

/// One past the largest numeric id, or 1 for an empty collection
pub fn next_numeric_id<'a>(keys: impl Iterator<Item = &'a str>) -> i64 {
    keys.filter_map(|k| normalize_id(k).parse::<i64>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

/// Next id for integer-keyed collections
pub fn next_int_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().map_or(1, |max| max.max(0) + 1)
}

/// Summary of a migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub people_changed: usize,
    pub intel_changed: usize,
}

/// Handle to every collection
pub struct Database {
    pub agents: JsonCollection<Agent>,
    pub people: JsonCollection<Person>,
    pub intel: JsonCollection<IntelReport>,
}

impl Database {
    /// Open the collections in a data directory
    pub async fn open(data_dir: &Path) -> Result<Self, ArchiveError> {
        info!("Opening record store at {}", data_dir.display());
        let storage = FileStorage::open(data_dir).await?;
        Self::with_storage(Arc::new(storage)).await
    }

    pub async fn with_storage(storage: Arc<dyn Storage>) -> Result<Self, ArchiveError> {
        Ok(Self {
            agents: JsonCollection::load(AGENT_COLLECTION, storage.clone()).await?,
            people: JsonCollection::load(PERSON_COLLECTION, storage.clone()).await?,
            intel: JsonCollection::load(INTEL_COLLECTION, storage).await?,
        })
    }

    /// Create a `Redline` administrator when the roster is empty.
    ///
    /// Returns the new agent, or `None` when the roster already has members.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Agent>, ArchiveError> {
        if !self.agents.is_empty().await {
            return Ok(None);
        }
        let hash = crate::auth::hash_password(password)?;
        let now = schemas::now_iso();

        self.agents
            .update(|agents| {
                if !agents.is_empty() {
                    return Ok(None);
                }
                let admin = Agent {
                    id: "1".into(),
                    name: "Archive Administrator".into(),
                    username: username.to_string(),
                    password: hash,
                    rank: AgentRank::Director.as_str().to_string(),
                    clearance: archive_clearance::Clearance::Redline,
                    created_by: "system".into(),
                    created_at: schemas::today(),
                    last_active: now,
                    extra: Default::default(),
                };
                agents.push(admin.clone());
                Ok(Some(admin))
            })
            .await
    }

    /// Rewrite people and intel files onto the canonical access-level scale.
    pub async fn migrate_access_levels(storage: Arc<dyn Storage>) -> Result<MigrationReport, ArchiveError> {
        let people_changed = match storage.read(PERSON_COLLECTION).await? {
            Some(raw) => collection::decode::<Person>(PERSON_COLLECTION, &raw)?.1,
            None => 0,
        };
        let intel_changed = match storage.read(INTEL_COLLECTION).await? {
            Some(raw) => collection::decode::<IntelReport>(INTEL_COLLECTION, &raw)?.1,
            None => 0,
        };

        // Loading canonicalizes in memory; flushing writes the canonical form.
        let people = JsonCollection::<Person>::load(PERSON_COLLECTION, storage.clone()).await?;
        people.flush().await?;
        let intel = JsonCollection::<IntelReport>::load(INTEL_COLLECTION, storage).await?;
        intel.flush().await?;

        Ok(MigrationReport {
            people_changed,
            intel_changed,
        })
    }
}
