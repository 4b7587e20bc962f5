//! Text-to-speech backends.
//!
//! The pipeline only sees the [`Synthesizer`] trait. The bundled backend
//! calls the Google Translate TTS endpoint, which caps each request at about
//! 100 characters, so longer text is split on whitespace and the returned
//! MP3 segments are concatenated.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::SpeechConfig;
use crate::error::SynthesisError;

const MAX_CHUNK_CHARS: usize = 100;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render `text` in `language` to MP3 bytes.
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError>;
}

pub struct GoogleTranslateSynthesizer {
    host: String,
    client: Client,
}

impl GoogleTranslateSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("speakboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Synthesizer for GoogleTranslateSynthesizer {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        let t0 = Instant::now();
        let chunks = split_chunks(text, MAX_CHUNK_CHARS);
        let url = format!("{}/translate_tts", self.host);
        let total = chunks.len().to_string();

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let idx = i.to_string();
            let textlen = chunk.chars().count().to_string();
            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", language),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("client", "tw-ob"),
                ])
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(SynthesisError::Status(resp.status().as_u16()));
            }

            let bytes = resp.bytes().await?;
            debug!("Chunk {}/{total}: {} bytes", i + 1, bytes.len());
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        info!(
            "Synthesized {} chars in {} chunk(s) ({:.0}ms)",
            text.chars().count(),
            chunks.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(audio)
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking on
/// whitespace where possible. Words longer than `max_chars` are hard-split.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            chunks.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { word.len() + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello  world", 100), vec!["hello world"]);
    }

    #[test]
    fn splits_on_word_boundaries() {
        let chunks = split_chunks("aaa bbb ccc ddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn hard_splits_oversized_words() {
        let chunks = split_chunks("ab abcdefgh c", 3);
        assert_eq!(chunks, vec!["ab", "abc", "def", "gh", "c"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = split_chunks("ééé ééé", 3);
        assert_eq!(chunks, vec!["ééé", "ééé"]);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(split_chunks(" \n\t ", 10).is_empty());
    }
}
