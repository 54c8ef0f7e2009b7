//! Lifecycle of one terminal session multiplexed over a shared transport.
//!
//! A session asks the proxy for a room with a fresh secret, binds to the room
//! whose reply carries that secret, and from then on only accepts traffic
//! tagged with its own room. Many sessions may share one transport, so every
//! inbound handler filters strictly and never treats a mismatch as an error.

pub mod events;
pub mod secret;
pub mod target;
mod teardown;
pub mod view;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error};
use transport_bus::{BusError, BusMessage, EventBus, EventHandler};

use crate::clipboard::SelectionStore;
use crate::config::Settings;
use crate::terminal::{
    self, KeyChord, TerminalEvent, TerminalEvents, TerminalFactory, TerminalHandle,
};
use crate::transport::TransportSlot;

pub use events::RoomId;
pub use secret::{SecretSource, SessionSecret, UuidSecrets};
pub use target::SessionTarget;
pub use teardown::TeardownReport;
pub use view::{SessionView, ViewState};

use events::{InputFrame, LogoutNotice, ResizeFrame, RoomAssigned, RoomOutput, name};
use teardown::{SubscriptionSet, TeardownLatch, TeardownPlan};

const LOG_TARGET: &str = "beach_term::session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session needs a host, share room id or token")]
    MissingTarget,
    #[error("session inputs name more than one target kind")]
    AmbiguousTarget,
    #[error("invalid session target: {0}")]
    InvalidTarget(String),
    #[error("terminal has not been created")]
    TerminalMissing,
    #[error("session is not attached to a transport")]
    NotAttached,
    #[error("session is already attached to a transport")]
    AlreadyAttached,
    #[error("session has been terminated")]
    Terminated,
    #[error("transport error: {0}")]
    Transport(#[from] BusError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The session is live; the caller must confirm before it is replaced.
    ConfirmationRequired,
    /// A new initiation went out with a fresh secret.
    Reinitiated,
}

struct SessionState {
    target: SessionTarget,
    secret: SessionSecret,
    room: Option<RoomId>,
    connected: bool,
    terminal: Option<Box<dyn TerminalHandle>>,
    transport: Option<Arc<dyn EventBus>>,
    subscriptions: SubscriptionSet,
    selection: Option<SelectionStore>,
    latch: TeardownLatch,
    view: watch::Sender<ViewState>,
}

impl SessionState {
    fn publish(&self) {
        self.view.send_replace(ViewState {
            connected: self.connected,
            room: self.room.clone(),
            terminal: self.terminal.as_ref().map(|terminal| terminal.size()),
        });
    }

    fn bind_room(&mut self, secret: &SessionSecret, room: &RoomId) -> bool {
        if self.latch.fired() || *secret != self.secret {
            debug!(target: LOG_TARGET, %secret, %room, "ignoring room reply for another attempt");
            return false;
        }
        debug!(target: LOG_TARGET, %room, kind = self.target.label(), "session bound to room");
        self.room = Some(room.clone());
        self.connected = true;
        self.publish();
        true
    }

    fn write_if_bound(&mut self, room: &RoomId, data: &str) -> bool {
        if self.room.as_ref() != Some(room) {
            return false;
        }
        match self.terminal.as_mut() {
            Some(terminal) => {
                terminal.write(data.as_bytes());
                true
            }
            None => false,
        }
    }

    fn mark_disconnected(&mut self) {
        if self.connected {
            self.connected = false;
            self.publish();
        }
    }

    fn end_from_server(&mut self, room: Option<&RoomId>, data: Option<&str>) -> bool {
        if self.target.is_observer() {
            // The watched session is over whatever room the notice names.
            if let (Some(data), Some(terminal)) = (data, self.terminal.as_mut()) {
                terminal.write(data.as_bytes());
            }
            self.mark_disconnected();
            return true;
        }
        if room.is_none() || room != self.room.as_ref() {
            debug!(target: LOG_TARGET, room = ?room, "ignoring logout for another room");
            return false;
        }
        debug!(target: LOG_TARGET, room = ?room, "server ended session");
        self.mark_disconnected();
        true
    }

    fn detach(&mut self) -> TeardownPlan {
        let transport = self.transport.take();
        let logout = match (transport, self.room.clone()) {
            (Some(transport), Some(room)) if !self.target.is_observer() => Some((transport, room)),
            _ => None,
        };
        self.connected = false;
        let terminal = self.terminal.take();
        let subscriptions = std::mem::take(&mut self.subscriptions);
        self.publish();
        TeardownPlan {
            logout,
            terminal,
            subscriptions,
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        if self.latch.begin() {
            let report = self.detach().run();
            debug!(target: LOG_TARGET, ?report, "session dropped");
        }
    }
}

/// Drives one session from initiation to teardown. Clones share the session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<SessionState>>,
    secrets: Arc<dyn SecretSource>,
    view: SessionView,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SessionController")
            .field("target", &state.target)
            .field("room", &state.room)
            .field("connected", &state.connected)
            .field("terminated", &state.latch.fired())
            .finish()
    }
}

impl SessionController {
    /// Creates the session's terminal and first secret. Nothing is sent until
    /// the session is attached to a transport.
    pub fn new(
        target: SessionTarget,
        settings: &Settings,
        terminals: &dyn TerminalFactory,
        secrets: Arc<dyn SecretSource>,
    ) -> Self {
        let (tx, view) = SessionView::channel(ViewState::default());
        let inner = Arc::new_cyclic(|weak: &Weak<Mutex<SessionState>>| {
            let events = {
                let weak = weak.clone();
                TerminalEvents::new(move |event| on_terminal_event(&weak, event))
            };
            let state = SessionState {
                target,
                secret: secrets.generate(),
                room: None,
                connected: false,
                terminal: Some(terminals.create(settings.font_size, events)),
                transport: None,
                subscriptions: SubscriptionSet::default(),
                selection: None,
                latch: TeardownLatch::default(),
                view: tx,
            };
            state.publish();
            Mutex::new(state)
        });
        Self {
            inner,
            secrets,
            view,
        }
    }

    /// Terminal selections from now on are recorded into `store`.
    pub fn track_selection(&self, store: SelectionStore) {
        self.inner.lock().selection = Some(store);
    }

    /// Waits for the shared transport and attaches to it. A failed connect is
    /// logged and leaves the session pending.
    pub async fn attach_from(&self, slot: &TransportSlot) -> Result<(), SessionError> {
        let transport = match slot.acquire().await {
            Ok(transport) => transport,
            Err(err) => {
                error!(target: LOG_TARGET, error = %err, "transport unavailable");
                return Err(err.into());
            }
        };
        self.attach(transport)
    }

    /// Registers the session's handlers on `transport` and sends the initiation.
    pub fn attach(&self, transport: Arc<dyn EventBus>) -> Result<(), SessionError> {
        {
            let mut state = self.inner.lock();
            if state.latch.fired() {
                return Err(SessionError::Terminated);
            }
            if state.transport.is_some() {
                return Err(SessionError::AlreadyAttached);
            }
            state.transport = Some(transport.clone());
        }

        // Handlers go in before the request so a fast reply cannot be missed.
        let mut subscriptions = self.subscribe(&transport);
        {
            let mut state = self.inner.lock();
            if !state.latch.fired() {
                state.subscriptions = subscriptions;
                drop(state);
                self.initiate()?;
                return Ok(());
            }
        }
        subscriptions.release_all();
        Err(SessionError::Terminated)
    }

    fn subscribe(&self, transport: &Arc<dyn EventBus>) -> SubscriptionSet {
        let weak = Arc::downgrade(&self.inner);
        let mut set = SubscriptionSet::default();

        let handlers: [(&str, EventHandler); 5] = [
            (
                name::DATA,
                inbound(weak.clone(), name::DATA, |state, output: RoomOutput| {
                    if let Some(room) = output.room {
                        state.write_if_bound(&room, &output.data);
                    }
                }),
            ),
            (
                name::SHARE_ROOM_DATA,
                inbound(weak.clone(), name::SHARE_ROOM_DATA, |state, output: RoomOutput| {
                    if let Some(room) = output.room {
                        state.write_if_bound(&room, &output.data);
                    }
                }),
            ),
            (name::DISCONNECT, {
                let weak = weak.clone();
                let handler: EventHandler = Arc::new(move |_msg: &BusMessage| {
                    if let Some(inner) = weak.upgrade() {
                        debug!(target: LOG_TARGET, "transport disconnected");
                        inner.lock().mark_disconnected();
                    }
                });
                handler
            }),
            (
                name::LOGOUT,
                inbound(weak.clone(), name::LOGOUT, |state, notice: LogoutNotice| {
                    state.end_from_server(notice.room.as_ref(), notice.data.as_deref());
                }),
            ),
            (
                name::ROOM,
                inbound(weak, name::ROOM, |state, reply: RoomAssigned| {
                    if let Some(room) = reply.room {
                        state.bind_room(&reply.secret, &room);
                    }
                }),
            ),
        ];

        for (event, handler) in handlers {
            set.track(transport, transport.on(event, handler));
        }
        set
    }

    /// Sends the initiation event for the current secret, sized from the live
    /// terminal.
    pub fn initiate(&self) -> Result<SessionSecret, SessionError> {
        let (transport, event, payload, secret) = {
            let state = self.inner.lock();
            if state.latch.fired() {
                return Err(SessionError::Terminated);
            }
            let terminal = state.terminal.as_ref().ok_or(SessionError::TerminalMissing)?;
            let transport = state.transport.clone().ok_or(SessionError::NotAttached)?;
            let (event, payload) = state.target.initiation(&state.secret, terminal.size())?;
            (transport, event, payload, state.secret.clone())
        };

        debug!(target: LOG_TARGET, event, %secret, "initiating session");
        emit(&self.inner, transport.as_ref(), event, payload)?;
        Ok(secret)
    }

    /// Applies a `room` reply. Only the reply for the current secret binds.
    pub fn on_room_assigned(&self, secret: &SessionSecret, room: &RoomId) -> bool {
        self.inner.lock().bind_room(secret, room)
    }

    /// Writes room output to the terminal if it belongs to this session's room.
    pub fn on_data(&self, room: &RoomId, data: &str) -> bool {
        self.inner.lock().write_if_bound(room, data)
    }

    pub fn on_share_room_data(&self, room: &RoomId, data: &str) -> bool {
        self.inner.lock().write_if_bound(room, data)
    }

    /// Transport-wide disconnect; applies regardless of room.
    pub fn on_disconnect(&self) {
        self.inner.lock().mark_disconnected();
    }

    /// Server-side logout. Observers always close; owners only for their room.
    pub fn on_logout(&self, room: Option<&RoomId>, data: Option<&str>) -> bool {
        self.inner.lock().end_from_server(room, data)
    }

    /// Relays user input to the bound room. Input typed before a room is
    /// assigned is dropped; returns whether anything was sent.
    pub fn send_input(&self, data: &str) -> Result<bool, SessionError> {
        relay_input(&self.inner, data)
    }

    /// Pushes a size change. Sent whenever a transport is attached, bound or not.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<bool, SessionError> {
        let Some(transport) = self.inner.lock().transport.clone() else {
            return Ok(false);
        };
        let payload = events::encode(&ResizeFrame { cols, rows })?;
        emit(&self.inner, transport.as_ref(), name::RESIZE, payload)?;
        Ok(true)
    }

    /// True when reconnecting would replace a live session.
    pub fn requires_reconnect_confirmation(&self) -> bool {
        self.inner.lock().connected
    }

    /// Starts a new attempt on the same terminal with a fresh secret. A live
    /// session is only replaced when `confirmed` is set.
    pub fn reconnect(&self, confirmed: bool) -> Result<ReconnectOutcome, SessionError> {
        {
            let mut state = self.inner.lock();
            if state.latch.fired() {
                return Err(SessionError::Terminated);
            }
            if state.transport.is_none() {
                return Err(SessionError::NotAttached);
            }
            if state.connected && !confirmed {
                return Ok(ReconnectOutcome::ConfirmationRequired);
            }
            state.secret = self.secrets.generate();
            state.room = None;
            state.connected = false;
            state.publish();
        }
        self.initiate()?;
        Ok(ReconnectOutcome::Reinitiated)
    }

    /// Tears the session down once: logout, terminal, subscriptions. Later
    /// calls return `None` and send nothing.
    pub fn terminate(&self) -> Option<TeardownReport> {
        let plan = {
            let mut state = self.inner.lock();
            if !state.latch.begin() {
                debug!(target: LOG_TARGET, "session already terminated");
                return None;
            }
            state.detach()
        };
        let report = plan.run();
        debug!(target: LOG_TARGET, ?report, "session terminated");
        Some(report)
    }

    pub fn focus(&self) {
        if let Some(terminal) = self.inner.lock().terminal.as_mut() {
            terminal.focus();
        }
    }

    pub fn key_passes_to_terminal(&self, chord: KeyChord) -> bool {
        let has_selection = self
            .inner
            .lock()
            .terminal
            .as_ref()
            .is_some_and(|terminal| terminal.has_selection());
        terminal::key_passes_to_terminal(chord, has_selection)
    }

    pub fn view(&self) -> SessionView {
        self.view.clone()
    }

    pub fn target(&self) -> SessionTarget {
        self.inner.lock().target.clone()
    }

    pub fn secret(&self) -> SessionSecret {
        self.inner.lock().secret.clone()
    }

    pub fn room(&self) -> Option<RoomId> {
        self.inner.lock().room.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock().latch.fired()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

}

fn emit(
    inner: &Mutex<SessionState>,
    transport: &dyn EventBus,
    event: &str,
    payload: bytes::Bytes,
) -> Result<(), SessionError> {
    if let Err(err) = transport.emit(event, payload) {
        error!(target: LOG_TARGET, event, error = %err, "transport rejected event");
        inner.lock().mark_disconnected();
        return Err(err.into());
    }
    Ok(())
}

fn relay_input(inner: &Mutex<SessionState>, data: &str) -> Result<bool, SessionError> {
    let (transport, room) = {
        let state = inner.lock();
        match (state.transport.clone(), state.room.clone()) {
            (Some(transport), Some(room)) => (transport, room),
            _ => {
                debug!(target: LOG_TARGET, bytes = data.len(), "dropping input before room assignment");
                return Ok(false);
            }
        }
    };
    let payload = events::encode(&InputFrame {
        data: data.to_string(),
        room,
    })?;
    emit(inner, transport.as_ref(), name::DATA, payload)?;
    Ok(true)
}

/// Keystrokes go to the bound room; selections to the tracked store.
fn on_terminal_event(weak: &Weak<Mutex<SessionState>>, event: TerminalEvent) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    match event {
        TerminalEvent::Data(data) => {
            if let Err(err) = relay_input(&inner, &data) {
                debug!(target: LOG_TARGET, error = %err, "terminal input not relayed");
            }
        }
        TerminalEvent::Selection(text) => {
            let store = inner.lock().selection.clone();
            if let Some(store) = store {
                store.record(&text);
            }
        }
    }
}

/// Wraps a typed handler so it decodes the payload and runs against live
/// session state. Handlers outliving their session do nothing.
fn inbound<T, F>(weak: Weak<Mutex<SessionState>>, event: &'static str, apply: F) -> EventHandler
where
    T: DeserializeOwned,
    F: Fn(&mut SessionState, T) + Send + Sync + 'static,
{
    Arc::new(move |msg: &BusMessage| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match events::decode::<T>(&msg.payload) {
            Ok(payload) => apply(&mut inner.lock(), payload),
            Err(err) => {
                debug!(target: LOG_TARGET, event, error = %err, "dropping undecodable event");
            }
        }
    })
}
