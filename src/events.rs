//! Single-threaded cooperative event loop (§4.E). A thread-safe `post`
//! enqueues typed events; one worker drains the queue, dispatching each to
//! its one registered handler. Mirrors the teacher's `Network`/`App` split
//! (`network.rs` posts `IoEvent`s that `app.rs` consumes on the main loop) —
//! here the channel is generic over an `EventType` enum instead of one fixed
//! `IoEvent`.

use crate::ids::SpotifyId;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// The handful of event kinds the core posts and reacts to (§4.E).
#[derive(Debug, Clone)]
pub enum EventType {
    /// Informational push from the service.
    DealerMessage(Value),
    /// A request that demands a reply.
    DealerRequest(Value),
    /// The track-provider mutated its externally-visible projection.
    TrackProviderUpdated,
    /// Metadata finished loading for a track.
    CurrentTrackMetadata {
        track_id: SpotifyId,
        name: String,
        duration_ms: u32,
    },
}

impl EventType {
    fn kind_name(&self) -> &'static str {
        match self {
            EventType::DealerMessage(_) => "DealerMessage",
            EventType::DealerRequest(_) => "DealerRequest",
            EventType::TrackProviderUpdated => "TrackProviderUpdated",
            EventType::CurrentTrackMetadata { .. } => "CurrentTrackMetadata",
        }
    }
}

/// A callback invoked on the worker for one kind of event. Handlers must not
/// block; anything that would (HTTP, further dealer I/O) is spawned back
/// onto the runtime by the handler itself rather than awaited inline here.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: EventType);
}

impl<F> EventHandler for F
where
    F: Fn(EventType) + Send + Sync,
{
    fn handle(&self, event: EventType) {
        self(event)
    }
}

/// Thread-safe producer handle. Cloning shares the same underlying channel,
/// so the dealer's I/O task and any other producer can each hold one.
#[derive(Clone)]
pub struct EventPoster {
    sender: mpsc::UnboundedSender<EventType>,
}

impl EventPoster {
    /// Enqueues an event. Never blocks; the channel is unbounded because the
    /// dealer must never stall waiting on the worker (§5 ordering).
    pub fn post(&self, event: EventType) {
        // A closed receiver means the worker has shut down; there is
        // nothing left to notify, so the event is simply dropped.
        let _ = self.sender.send(event);
    }
}

/// The single worker that owns dispatch. At most one handler per event kind
/// (§4.E); registering a second handler for the same kind replaces the
/// first.
pub struct EventLoop {
    sender: mpsc::UnboundedSender<EventType>,
    receiver: mpsc::UnboundedReceiver<EventType>,
    handlers: HashMap<&'static str, Box<dyn EventHandler>>,
}

impl EventLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            handlers: HashMap::new(),
        }
    }

    pub fn poster(&self) -> EventPoster {
        EventPoster {
            sender: self.sender.clone(),
        }
    }

    pub fn on(&mut self, kind: &'static str, handler: impl EventHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Drains at most one event, waiting up to `timeout`. Returns `true` if
    /// an event was dispatched, `false` if the wait timed out idle (§5).
    pub async fn process_events(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => {
                let kind = event.kind_name();
                match self.handlers.get(kind) {
                    Some(handler) => handler.handle(event),
                    None => log::debug!("no handler registered for event kind {kind}, dropping"),
                }
                true
            }
            Ok(None) => false,
            Err(_) => false,
        }
    }

    /// Runs forever, dispatching events as they arrive. The embedding
    /// application spawns this as a task; it only returns once every
    /// `EventPoster` has been dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            let kind = event.kind_name();
            match self.handlers.get(kind) {
                Some(handler) => handler.handle(event),
                None => log::debug!("no handler registered for event kind {kind}, dropping"),
            }
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn dispatches_to_the_registered_handler() {
        let mut loop_ = EventLoop::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        loop_.on("TrackProviderUpdated", move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        let poster = loop_.poster();
        poster.post(EventType::TrackProviderUpdated);

        let dispatched = loop_.process_events(Duration::from_millis(50)).await;
        assert!(dispatched);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kind_is_dropped_not_panicking() {
        let mut loop_ = EventLoop::new();
        let poster = loop_.poster();
        poster.post(EventType::TrackProviderUpdated);
        let dispatched = loop_.process_events(Duration::from_millis(50)).await;
        assert!(dispatched);
    }

    #[tokio::test]
    async fn idle_wait_times_out() {
        let mut loop_ = EventLoop::new();
        let dispatched = loop_.process_events(Duration::from_millis(10)).await;
        assert!(!dispatched);
    }
}
