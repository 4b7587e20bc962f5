//! Ban registry: the set of submitter ids that may not speak.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::persistence::JsonCollection;

pub struct BanRegistry {
    banned: Mutex<BTreeSet<String>>,
    store: JsonCollection<BTreeSet<String>>,
}

impl BanRegistry {
    /// Load the ban list from `path`, creating an empty one if absent.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonCollection::new(path);
        let banned: BTreeSet<String> = store.load();
        info!("Loaded {} banned source(s)", banned.len());
        Self {
            banned: Mutex::new(banned),
            store,
        }
    }

    pub fn is_banned(&self, source_id: &str) -> bool {
        self.lock().contains(source_id)
    }

    /// Ban `source_id`. Returns `true` if it was not already banned.
    ///
    /// The full set is persisted even when nothing changed.
    pub fn ban(&self, source_id: &str) -> Result<bool> {
        let source_id = validate(source_id)?;
        let mut banned = self.lock();
        let added = banned.insert(source_id.to_string());
        self.persist(&banned);
        info!("Banned {source_id}");
        Ok(added)
    }

    /// Lift a ban. Returns `true` if `source_id` was banned.
    pub fn unban(&self, source_id: &str) -> Result<bool> {
        let source_id = validate(source_id)?;
        let mut banned = self.lock();
        let removed = banned.remove(source_id);
        self.persist(&banned);
        info!("Unbanned {source_id}");
        Ok(removed)
    }

    /// Banned ids in sorted order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The in-memory set keeps the mutation when the write fails.
    fn persist(&self, banned: &BTreeSet<String>) {
        if let Err(e) = self.store.save(banned) {
            error!("Failed to persist ban list: {e}");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.banned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(source_id: &str) -> Result<&str> {
    let trimmed = source_id.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid("IP address is required"));
    }
    Ok(trimmed)
}
