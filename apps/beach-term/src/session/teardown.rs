use std::sync::Arc;

use transport_bus::{EventBus, Subscription};

use super::events::{self, RoomId, name};
use crate::terminal::TerminalHandle;

/// Transport subscriptions registered on behalf of one session.
#[derive(Default)]
pub(crate) struct SubscriptionSet {
    entries: Vec<(Arc<dyn EventBus>, Subscription)>,
}

impl SubscriptionSet {
    pub(crate) fn track(&mut self, transport: &Arc<dyn EventBus>, subscription: Subscription) {
        self.entries.push((transport.clone(), subscription));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Revokes every handle individually; returns how many were still live.
    pub(crate) fn release_all(&mut self) -> usize {
        self.entries
            .drain(..)
            .filter(|(transport, subscription)| transport.off(subscription))
            .count()
    }
}

/// Latch that lets exactly one teardown trigger through.
#[derive(Debug, Default)]
pub(crate) struct TeardownLatch {
    fired: bool,
}

impl TeardownLatch {
    pub(crate) fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub(crate) fn fired(&self) -> bool {
        self.fired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub logout_sent: bool,
    pub terminal_destroyed: bool,
    pub subscriptions_released: usize,
}

/// Resources detached from a session, released after its lock is dropped.
pub(crate) struct TeardownPlan {
    pub(crate) logout: Option<(Arc<dyn EventBus>, RoomId)>,
    pub(crate) terminal: Option<Box<dyn TerminalHandle>>,
    pub(crate) subscriptions: SubscriptionSet,
}

impl TeardownPlan {
    /// Notifies the server first so local cleanup cannot race the logout.
    pub(crate) fn run(mut self) -> TeardownReport {
        let logout_sent = match self.logout.take() {
            Some((transport, room)) => send_logout(transport.as_ref(), &room),
            None => false,
        };

        let terminal_destroyed = match self.terminal.take() {
            Some(mut terminal) => {
                terminal.destroy();
                true
            }
            None => false,
        };

        let subscriptions_released = self.subscriptions.release_all();

        TeardownReport {
            logout_sent,
            terminal_destroyed,
            subscriptions_released,
        }
    }
}

fn send_logout(transport: &dyn EventBus, room: &RoomId) -> bool {
    let payload = match events::encode(room) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(target: "beach_term::session", room = %room, error = %err, "failed to encode logout");
            return false;
        }
    };
    match transport.emit(name::LOGOUT, payload) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(target: "beach_term::session", room = %room, error = %err, "logout not delivered");
            false
        }
    }
}
