//! Composition root: builds the stores, pipeline and shared state once.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::AppState;
use crate::artifacts::ArtifactStore;
use crate::bans::BanRegistry;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::error::Result;
use crate::messages::MessageLog;
use crate::pipeline::SpeechPipeline;
use crate::synth::Synthesizer;

/// Load persisted state, tidy the audio directory, and wire everything up.
pub fn build_state(config: &Config, synthesizer: Arc<dyn Synthesizer>) -> Result<AppState> {
    let storage = &config.storage;
    let bans = Arc::new(BanRegistry::open(storage.bans_path()));
    let log = Arc::new(MessageLog::open(storage.messages_path()));

    let artifacts = ArtifactStore::open(&storage.audio_dir)?;
    let latest = log.latest().map(|r| r.artifact_name);
    artifacts.sweep_except(latest.as_deref());
    info!(
        "Audio directory {} ({} artifact(s) on disk)",
        artifacts.root().display(),
        artifacts.list().len()
    );

    let broadcaster = Arc::new(Broadcaster::new(
        config.broadcast.capacity,
        Duration::from_secs(config.broadcast.keep_alive_secs),
    ));

    let pipeline = Arc::new(SpeechPipeline::new(
        &config.speech,
        bans.clone(),
        log.clone(),
        artifacts,
        synthesizer,
        broadcaster.clone(),
    ));

    Ok(AppState {
        pipeline,
        bans,
        log,
        broadcaster,
        admin: Arc::new(config.admin.clone()),
        trust_forwarded_for: config.server.trust_forwarded_for,
    })
}
