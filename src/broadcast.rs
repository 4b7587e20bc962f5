//! Live "play-audio" notifications for connected listeners.
//!
//! Each listener holds a broadcast receiver, exposed over SSE. Listeners only
//! see notifications sent after they subscribed, and a listener that goes
//! away simply drops its receiver.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

/// SSE event name listeners subscribe to.
pub const PLAY_AUDIO_EVENT: &str = "play-audio";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayAudio {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<PlayAudio>,
    keep_alive: Duration,
}

impl Broadcaster {
    /// `capacity` bounds how far a slow listener may fall behind before it
    /// starts skipping notifications.
    pub fn new(capacity: usize, keep_alive: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, keep_alive }
    }

    /// Tell every current listener to play `url`. Returns how many were told.
    pub fn notify(&self, url: &str) -> usize {
        let delivered = self
            .sender
            .send(PlayAudio { url: url.to_string() })
            .unwrap_or(0);
        debug!("Broadcast {PLAY_AUDIO_EVENT} {url} to {delivered} listener(s)");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayAudio> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// SSE response streaming notifications to one listener.
    pub fn sse(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let stream = BroadcastStream::new(self.subscribe()).filter_map(|result| match result {
            Ok(play) => match Event::default().event(PLAY_AUDIO_EVENT).json_data(&play) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!("Failed to encode {PLAY_AUDIO_EVENT} event: {e}");
                    None
                }
            },
            Err(e) => {
                debug!("Listener fell behind: {e}");
                None
            }
        });

        Sse::new(stream).keep_alive(KeepAlive::new().interval(self.keep_alive).text("ping"))
    }
}
