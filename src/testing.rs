//! Synthesizer doubles for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SynthesisError;
use crate::synth::Synthesizer;

/// Returns the text as "audio" and counts calls.
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeSynthesizer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("{language}:{text}").into_bytes())
    }
}

pub struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>, SynthesisError> {
        Err(SynthesisError::Other("quota exceeded".into()))
    }
}
