//! Speech request pipeline.
//!
//! intake → ban check → synthesis → commit → reclamation → notify
//!
//! Synthesis runs unlocked. Everything from timestamp assignment through
//! deletion of the superseded artifact runs under `commit_lock`, so names
//! stay unique and a request never reclaims the artifact another request just
//! committed. At most one artifact is on disk after each delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::bans::BanRegistry;
use crate::broadcast::Broadcaster;
use crate::config::SpeechConfig;
use crate::error::{Error, Result, SynthesisError};
use crate::messages::{MessageLog, MessageRecord};
use crate::synth::Synthesizer;

/// URL prefix under which artifacts are served.
pub const AUDIO_ROUTE: &str = "/audio";

pub fn artifact_reference(artifact_name: &str) -> String {
    format!("{AUDIO_ROUTE}/{artifact_name}")
}

#[derive(Debug, Clone)]
pub struct SpeakRequest {
    pub text: String,
    pub source_id: String,
}

/// What happened to the superseded artifact after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// First record, nothing to reclaim.
    Nothing,
    Reclaimed(String),
    /// The request is committed, but the old file could not be deleted.
    Failed { artifact: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Delivered {
    pub record: MessageRecord,
    pub reference: String,
    pub cleanup: Cleanup,
    pub listeners: usize,
}

pub struct SpeechPipeline {
    bans: Arc<BanRegistry>,
    log: Arc<MessageLog>,
    artifacts: ArtifactStore,
    synthesizer: Arc<dyn Synthesizer>,
    broadcaster: Arc<Broadcaster>,
    language: String,
    max_text_chars: usize,
    timeout: Duration,
    commit_lock: AsyncMutex<()>,
}

impl SpeechPipeline {
    pub fn new(
        config: &SpeechConfig,
        bans: Arc<BanRegistry>,
        log: Arc<MessageLog>,
        artifacts: ArtifactStore,
        synthesizer: Arc<dyn Synthesizer>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            bans,
            log,
            artifacts,
            synthesizer,
            broadcaster,
            language: config.language.clone(),
            max_text_chars: config.max_text_chars,
            timeout: Duration::from_secs(config.timeout_secs),
            commit_lock: AsyncMutex::new(()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run one request to a terminal state.
    pub async fn speak(&self, req: SpeakRequest) -> Result<Delivered> {
        let t_total = Instant::now();

        // Intake
        let text = req.text.trim();
        if text.is_empty() {
            return Err(Error::invalid("Text is required"));
        }
        let chars = text.chars().count();
        if chars > self.max_text_chars {
            return Err(Error::invalid(format!(
                "Text is too long ({chars} chars, max {})",
                self.max_text_chars
            )));
        }

        // Ban check
        if self.bans.is_banned(&req.source_id) {
            info!("Rejected speak request from banned source {}", req.source_id);
            return Err(Error::Banned);
        }

        let preview: String = text.chars().take(80).collect();
        info!(
            "Speak from {}: \"{}{}\" ({chars} chars)",
            req.source_id,
            preview.replace('\n', " "),
            if chars > 80 { "..." } else { "" },
        );

        // Synthesis (no retry)
        let t_synth = Instant::now();
        let audio = match tokio::time::timeout(
            self.timeout,
            self.synthesizer.synthesize(text, &self.language),
        )
        .await
        {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                warn!("Error in generating speech: {e}");
                return Err(e.into());
            }
            Err(_) => {
                let e = SynthesisError::Timeout(self.timeout.as_secs());
                warn!("Error in generating speech: {e}");
                return Err(e.into());
            }
        };
        let synth_ms = t_synth.elapsed().as_secs_f64() * 1000.0;

        let (record, reference, cleanup, listeners) = {
            let _guard = self.commit_lock.lock().await;

            // Commit
            let timestamp = self.log.next_timestamp(Utc::now());
            let name = crate::messages::artifact_name(timestamp);
            self.artifacts.write(&name, &audio)?;
            let record = match self.log.append(text, &req.source_id, timestamp) {
                Ok(record) => record,
                Err(e) => {
                    if let Err(rollback) = self.artifacts.remove(&name) {
                        warn!("Failed to remove uncommitted artifact: {rollback}");
                    }
                    return Err(e);
                }
            };

            // Reclamation
            let cleanup = self.reclaim(&record);

            // Notify in commit order, before the next commit can reclaim this artifact
            let reference = artifact_reference(&record.artifact_name);
            let listeners = self.broadcaster.notify(&reference);
            (record, reference, cleanup, listeners)
        };

        info!(
            "Delivered {reference}: synth={synth_ms:.0}ms total={:.0}ms listeners={listeners}",
            t_total.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Delivered {
            record,
            reference,
            cleanup,
            listeners,
        })
    }

    fn reclaim(&self, record: &MessageRecord) -> Cleanup {
        let Some(previous) = self.log.previous_artifact(record) else {
            return Cleanup::Nothing;
        };

        match self.artifacts.remove(&previous) {
            Ok(()) => Cleanup::Reclaimed(previous),
            Err(e) => {
                warn!("Failed to reclaim previous artifact: {e}");
                Cleanup::Failed {
                    artifact: previous,
                    reason: e.to_string(),
                }
            }
        }
    }
}
