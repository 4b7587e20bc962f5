//! Append-only log of spoken messages.
//!
//! Records are kept forever, in arrival order. Each record names the audio
//! artifact rendered for it, but the artifact file itself is reclaimed once a
//! newer message arrives; a record does not imply its file still exists.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::persistence::JsonCollection;

/// File extension of rendered artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub artifact_name: String,
    pub source_id: String,
}

/// Filesystem-safe artifact name for a timestamp.
///
/// `2026-10-16T09:30:00.123Z` becomes `2026-10-16T09-30-00-123Z.mp3`.
pub fn artifact_name(timestamp: DateTime<Utc>) -> String {
    let stamp = timestamp
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{stamp}.{ARTIFACT_EXTENSION}")
}

pub struct MessageLog {
    records: Mutex<Vec<MessageRecord>>,
    store: JsonCollection<Vec<MessageRecord>>,
}

impl MessageLog {
    /// Load the log from `path`, creating an empty one if absent.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonCollection::new(path);
        let records: Vec<MessageRecord> = store.load();
        info!("Loaded {} message record(s)", records.len());
        Self {
            records: Mutex::new(records),
            store,
        }
    }

    /// Append a record and persist the whole log.
    ///
    /// A failed write is logged; the record stays in memory either way.
    pub fn append(
        &self,
        text: &str,
        source_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<MessageRecord> {
        if text.trim().is_empty() {
            return Err(Error::invalid("Text is required"));
        }

        let record = MessageRecord {
            text: text.to_string(),
            timestamp,
            artifact_name: artifact_name(timestamp),
            source_id: source_id.to_string(),
        };

        let mut records = self.lock();
        records.push(record.clone());
        if let Err(e) = self.store.save(&records) {
            error!("Failed to persist message log: {e}");
        }
        debug!(
            "Appended message #{} from {} as {}",
            records.len(),
            record.source_id,
            record.artifact_name
        );

        Ok(record)
    }

    pub fn snapshot(&self) -> Vec<MessageRecord> {
        self.lock().clone()
    }

    pub fn latest(&self) -> Option<MessageRecord> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Artifact of the record immediately before `record`, if there is one.
    pub fn previous_artifact(&self, record: &MessageRecord) -> Option<String> {
        let records = self.lock();
        let position = records.iter().rposition(|r| r == record)?;
        position
            .checked_sub(1)
            .map(|i| records[i].artifact_name.clone())
    }

    /// Timestamp for the next record: `now` at millisecond precision, pushed
    /// forward when needed so it is strictly later than the latest record.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(3);
        match self.lock().last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::milliseconds(1),
            _ => now,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MessageRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
