//! Right-click paste into a session.
//!
//! With quick paste on, a context-menu click forwards text into the session
//! instead of opening the menu: the OS clipboard when one is available,
//! otherwise the last selection the terminal reported.

use std::sync::Arc;

use async_trait::async_trait;
use copypasta::{ClipboardContext, ClipboardProvider};
use parking_lot::RwLock;
use thiserror::Error;

use crate::config::Settings;
use crate::session::{SessionController, SessionError};

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard read failed: {0}")]
    Read(String),
}

#[async_trait]
pub trait ClipboardSource: Send + Sync {
    async fn read_text(&self) -> Result<String, ClipboardError>;
}

/// OS clipboard via `copypasta`. Each read opens a fresh context on a
/// blocking thread since providers are not `Send` on every platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[async_trait]
impl ClipboardSource for SystemClipboard {
    async fn read_text(&self) -> Result<String, ClipboardError> {
        tokio::task::spawn_blocking(|| {
            let mut ctx =
                ClipboardContext::new().map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            ctx.get_contents()
                .map_err(|err| ClipboardError::Read(err.to_string()))
        })
        .await
        .map_err(|err| ClipboardError::Read(err.to_string()))?
    }
}

/// Last text selected in a terminal. Shared by every session that should
/// paste from it.
#[derive(Debug, Default, Clone)]
pub struct SelectionStore {
    text: Arc<RwLock<Option<String>>>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the trimmed selection; an empty selection clears the store.
    pub fn record(&self, selection: &str) {
        let trimmed = selection.trim();
        *self.text.write() = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    pub fn clear(&self) {
        *self.text.write() = None;
    }

    pub fn current(&self) -> Option<String> {
        self.text.read().clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextMenuTrigger {
    pub ctrl_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteDecision {
    /// Leave the click to the default menu.
    PassThrough,
    FromClipboard,
    FromSelection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuDisposition {
    /// Show the default context menu.
    Default,
    /// Text was (or is being) forwarded; the default menu must not open.
    Suppressed,
}

pub struct ClipboardBridge {
    selection: SelectionStore,
    clipboard: Option<Arc<dyn ClipboardSource>>,
}

impl ClipboardBridge {
    pub fn new(selection: SelectionStore, clipboard: Option<Arc<dyn ClipboardSource>>) -> Self {
        Self {
            selection,
            clipboard,
        }
    }

    pub fn with_system_clipboard(selection: SelectionStore) -> Self {
        Self::new(selection, Some(Arc::new(SystemClipboard)))
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    /// Makes `session`'s terminal selections feed this bridge's store.
    pub fn bind(&self, session: &SessionController) {
        session.track_selection(self.selection.clone());
    }

    /// Decides synchronously so the host can suppress the menu before any
    /// clipboard read completes.
    pub fn decide(&self, trigger: ContextMenuTrigger, settings: &Settings) -> PasteDecision {
        if trigger.ctrl_key || !settings.quick_paste {
            return PasteDecision::PassThrough;
        }
        if self.clipboard.is_some() {
            return PasteDecision::FromClipboard;
        }
        match self.selection.current() {
            Some(text) => PasteDecision::FromSelection(text),
            None => PasteDecision::PassThrough,
        }
    }

    /// Handles a right click on `session`'s terminal.
    pub async fn on_context_menu(
        &self,
        trigger: ContextMenuTrigger,
        settings: &Settings,
        session: &SessionController,
    ) -> Result<MenuDisposition, SessionError> {
        session.focus();
        match self.decide(trigger, settings) {
            PasteDecision::PassThrough => Ok(MenuDisposition::Default),
            PasteDecision::FromSelection(text) => {
                session.send_input(&text)?;
                Ok(MenuDisposition::Suppressed)
            }
            PasteDecision::FromClipboard => {
                let Some(clipboard) = self.clipboard.as_ref() else {
                    return Ok(MenuDisposition::Default);
                };
                match clipboard.read_text().await {
                    Ok(text) => {
                        session.send_input(&text)?;
                        Ok(MenuDisposition::Suppressed)
                    }
                    Err(ClipboardError::Unavailable(reason)) => {
                        tracing::debug!(target: "beach_term::clipboard", %reason, "no clipboard, pasting selection");
                        match self.selection.current() {
                            Some(text) => {
                                session.send_input(&text)?;
                                Ok(MenuDisposition::Suppressed)
                            }
                            None => Ok(MenuDisposition::Default),
                        }
                    }
                    Err(err) => {
                        tracing::error!(target: "beach_term::clipboard", error = %err, "quick paste failed");
                        Ok(MenuDisposition::Suppressed)
                    }
                }
            }
        }
    }
}
