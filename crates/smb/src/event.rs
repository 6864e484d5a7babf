//! A tiny pub/sub bus the engine uses to tell callers about state changes
//! it doesn't otherwise have a natural place to report (spec.md §3's
//! `EventBus`): lost connections and logged-off sessions.
//!
//! Grounded on the teacher's own `Connection`/`notify` machinery, narrowed
//! to `tokio::sync::broadcast` directly instead of a message-handler-chain
//! `notify` callback, since nothing downstream of the connection engine
//! (trees, files, pipes) survived the cut to spec.md's scope.

use tokio::sync::broadcast;

/// Lagging subscribers silently miss older events rather than blocking
/// the engine; this is diagnostic information, not a delivery guarantee.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The receive loop exited, for the reason attached.
    Disconnected { reason: String },
    /// A session was promoted out of the preauth table and is ready for
    /// use (spec.md §4.6 step 5).
    SessionEstablished { session_id: u64 },
    /// A session's signing key was invalidated mid-flight: the server
    /// returned `STATUS_NETWORK_SESSION_EXPIRED` and needs re-authentication
    /// before further use (spec.md §9).
    SessionExpired { session_id: u64 },
    LoggedOff { session_id: u64 },
}

pub struct EventBus {
    sender: broadcast::Sender<ConnectionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event. No-op if nobody is listening.
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.sender.send(event);
    }
}
