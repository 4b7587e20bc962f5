//! speakboard: moderated text-to-speech message board.
//!
//! Submitted text is rendered to audio, logged, and announced to every
//! connected listener. Only the newest artifact is kept on disk; the message
//! log keeps every record.

pub mod api;
pub mod artifacts;
pub mod bans;
pub mod bootstrap;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod messages;
pub mod persistence;
pub mod pipeline;
pub mod synth;

#[cfg(test)]
mod testing;

pub use error::{Error, Result, SynthesisError};
