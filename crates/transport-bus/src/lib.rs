use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

/// Event name the transport uses to report a lost connection.
pub const DISCONNECT_EVENT: &str = "disconnect";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
    #[error("bus transport error: {0}")]
    Transport(String),
}

pub type BusResult<T> = Result<T, BusError>;

pub type EventHandler = Arc<dyn Fn(&BusMessage) + Send + Sync>;

/// Handle returned by [`EventBus::on`]. Revoking it removes exactly the handler
/// it was issued for, independent of closure identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Named-event transport shared by every session on one socket.
///
/// Implementations must not run inbound handlers from inside `emit`.
pub trait EventBus: Send + Sync {
    fn emit(&self, topic: &str, payload: Bytes) -> BusResult<()>;
    fn on(&self, topic: &str, handler: EventHandler) -> Subscription;
    /// Returns `false` when the subscription was already removed.
    fn off(&self, subscription: &Subscription) -> bool;
    fn is_connected(&self) -> bool;
}

/// In-process bus for loopback wiring and tests.
///
/// Outbound traffic is observable through [`LocalBus::outbound`]; inbound
/// traffic is injected with [`LocalBus::deliver`].
pub struct LocalBus {
    handlers: RwLock<HashMap<String, Vec<(u64, EventHandler)>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    outbound: broadcast::Sender<BusMessage>,
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<String> = self.handlers.read().keys().cloned().collect();
        f.debug_struct("LocalBus")
            .field("topics", &topics)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            outbound: broadcast::channel(256).0,
        }
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receiver for every message emitted from this side of the bus.
    pub fn outbound(&self) -> broadcast::Receiver<BusMessage> {
        self.outbound.subscribe()
    }

    /// Dispatches an inbound event to its handlers in registration order and
    /// returns how many ran.
    pub fn deliver(&self, topic: &str, payload: Bytes) -> usize {
        // Snapshot so handlers may call `off` without deadlocking.
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(topic)
            .map(|entries| entries.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();
        let message = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        for handler in &handlers {
            handler(&message);
        }
        handlers.len()
    }

    /// Marks the bus closed and notifies `disconnect` subscribers.
    pub fn disconnect(&self) -> usize {
        self.connected.store(false, Ordering::SeqCst);
        self.deliver(DISCONNECT_EVENT, Bytes::new())
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.handlers
            .read()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl EventBus for LocalBus {
    fn emit(&self, topic: &str, payload: Bytes) -> BusResult<()> {
        if !self.is_connected() {
            return Err(BusError::Closed);
        }
        // No receivers is fine: nobody is observing this side.
        let _ = self.outbound.send(BusMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn on(&self, topic: &str, handler: EventHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    fn off(&self, subscription: &Subscription) -> bool {
        let mut guard = self.handlers.write();
        let Some(entries) = guard.get_mut(&subscription.topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            guard.remove(&subscription.topic);
        }
        removed
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
