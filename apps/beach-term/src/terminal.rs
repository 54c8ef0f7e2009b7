//! Contract for the terminal widget a session drives.
//!
//! The widget renders output and produces keystrokes; escape-sequence handling
//! lives entirely on its side. Sessions write bytes, read the live grid size
//! and manage its lifetime. Keystrokes and selections come back through the
//! [`TerminalEvents`] sink the widget is created with.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Wire form used by initiation events: `[cols, rows]`.
    pub fn as_pair(self) -> [u16; 2] {
        [self.cols, self.rows]
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

pub trait TerminalHandle: Send {
    fn write(&mut self, data: &[u8]);
    fn size(&self) -> TerminalSize;
    fn focus(&mut self);
    fn has_selection(&self) -> bool;
    /// Releases widget resources. Called once per terminal during teardown.
    fn destroy(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Keystrokes or pasted text typed into the widget.
    Data(String),
    /// The widget's selection changed; empty when it was cleared.
    Selection(String),
}

/// Where a widget reports what the user does in it. Must not be invoked from
/// inside a [`TerminalHandle`] call.
#[derive(Clone)]
pub struct TerminalEvents {
    sink: Arc<dyn Fn(TerminalEvent) + Send + Sync>,
}

impl TerminalEvents {
    pub fn new(sink: impl Fn(TerminalEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A sink that discards everything.
    pub fn ignored() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: TerminalEvent) {
        (self.sink)(event);
    }

    pub fn data(&self, data: impl Into<String>) {
        self.emit(TerminalEvent::Data(data.into()));
    }

    pub fn selection(&self, text: impl Into<String>) {
        self.emit(TerminalEvent::Selection(text.into()));
    }
}

impl fmt::Debug for TerminalEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalEvents").finish_non_exhaustive()
    }
}

/// Creates the terminal a session owns. Each session asks for exactly one.
pub trait TerminalFactory: Send + Sync {
    fn create(&self, font_size: u16, events: TerminalEvents) -> Box<dyn TerminalHandle>;
}

impl<F> TerminalFactory for F
where
    F: Fn(u16, TerminalEvents) -> Box<dyn TerminalHandle> + Send + Sync,
{
    fn create(&self, font_size: u16, events: TerminalEvents) -> Box<dyn TerminalHandle> {
        self(font_size, events)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub ctrl: bool,
    pub key: char,
}

impl KeyChord {
    pub fn plain(key: char) -> Self {
        Self { ctrl: false, key }
    }

    pub fn ctrl(key: char) -> Self {
        Self { ctrl: true, key }
    }
}

/// Whether a key event should reach the terminal. Ctrl+C over a selection and
/// Ctrl+V stay with the host UI so copy and paste keep working.
pub fn key_passes_to_terminal(chord: KeyChord, has_selection: bool) -> bool {
    if !chord.ctrl {
        return true;
    }
    match chord.key.to_ascii_lowercase() {
        'c' => !has_selection,
        'v' => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_copies_only_with_selection() {
        assert!(!key_passes_to_terminal(KeyChord::ctrl('c'), true));
        assert!(key_passes_to_terminal(KeyChord::ctrl('c'), false));
    }

    #[test]
    fn ctrl_v_never_reaches_terminal() {
        assert!(!key_passes_to_terminal(KeyChord::ctrl('v'), false));
        assert!(!key_passes_to_terminal(KeyChord::ctrl('V'), true));
    }

    #[test]
    fn plain_keys_pass_through() {
        for key in ['c', 'v', 'x', '\r'] {
            assert!(key_passes_to_terminal(KeyChord::plain(key), true));
        }
        assert!(key_passes_to_terminal(KeyChord::ctrl('d'), true));
    }

    #[test]
    fn events_reach_the_sink_in_order() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let events = {
            let seen = seen.clone();
            TerminalEvents::new(move |event| seen.lock().push(event))
        };
        events.data("l");
        events.selection("total 0");
        events.clone().data("s");
        assert_eq!(
            *seen.lock(),
            vec![
                TerminalEvent::Data("l".into()),
                TerminalEvent::Selection("total 0".into()),
                TerminalEvent::Data("s".into()),
            ]
        );
        TerminalEvents::ignored().data("dropped");
    }

    #[test]
    fn size_serializes_as_pair() {
        assert_eq!(TerminalSize::new(120, 40).as_pair(), [120, 40]);
        assert_eq!(TerminalSize::default(), TerminalSize::new(80, 24));
    }
}
