use tokio::sync::watch;

use super::events::RoomId;
use crate::terminal::TerminalSize;

/// What the hosting UI renders for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub connected: bool,
    pub room: Option<RoomId>,
    /// Size of the live terminal; `None` once it has been destroyed.
    pub terminal: Option<TerminalSize>,
}

/// Read side of a session's view state. Cloning is cheap and every clone sees
/// the latest state.
#[derive(Debug, Clone)]
pub struct SessionView {
    rx: watch::Receiver<ViewState>,
}

impl SessionView {
    pub(crate) fn channel(initial: ViewState) -> (watch::Sender<ViewState>, SessionView) {
        let (tx, rx) = watch::channel(initial);
        (tx, SessionView { rx })
    }

    pub fn connected(&self) -> bool {
        self.rx.borrow().connected
    }

    pub fn room(&self) -> Option<RoomId> {
        self.rx.borrow().room.clone()
    }

    pub fn terminal_size(&self) -> Option<TerminalSize> {
        self.rx.borrow().terminal
    }

    pub fn snapshot(&self) -> ViewState {
        self.rx.borrow().clone()
    }

    /// Waits for the next state change. Returns `false` once the session is
    /// dropped and no further updates can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
