//! Note editor satellite.
//!
//! Holds one local buffer for the task it shows. Typing re-arms a debounce;
//! when it expires the text goes to the owner as `context_saved`. Blur and
//! close flush immediately so nothing typed is lost.

use crate::config::Timings;
use crate::windows::debounce::Debounce;
use crate::windows::messenger::{Inbox, Messenger};
use crate::windows::payload::WindowPayload;
use crate::windows::protocol::{Envelope, WindowMessage};
use crate::windows::WindowId;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Local UI events for the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorInput {
    /// Full buffer contents after a keystroke
    Edit(String),
    Blur,
    Close,
}

pub struct NoteEditor {
    messenger: Messenger,
    owner: WindowId,
    task_id: String,
    task_title: String,
    buffer: String,
    dirty: bool,
    debounce: Debounce,
}

impl NoteEditor {
    /// Build from a launch payload; `None` unless it is a note editor payload
    pub fn from_payload(messenger: Messenger, payload: &WindowPayload, timings: &Timings) -> Option<Self> {
        let WindowPayload::NoteEditor {
            task_id,
            task_title,
            context_text,
            owner_window_id,
        } = payload
        else {
            return None;
        };

        Some(Self {
            messenger,
            owner: owner_window_id.clone(),
            task_id: task_id.clone(),
            task_title: task_title.clone(),
            buffer: context_text.clone(),
            dirty: false,
            debounce: Debounce::new(timings.note_debounce),
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_title(&self) -> &str {
        &self.task_title
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn has_pending_edit(&self) -> bool {
        self.dirty
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        self.buffer = text.into();
        self.dirty = true;
        self.debounce.arm(now);
    }

    /// Send the buffer if its debounce has expired
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.debounce.is_due(now) {
            self.flush()
        } else {
            false
        }
    }

    fn saved_message(&self) -> WindowMessage {
        WindowMessage::ContextSaved {
            task_id: self.task_id.clone(),
            context_text: self.buffer.clone(),
        }
    }

    /// Send any pending edit now. Returns true if something was sent.
    /// An undelivered edit stays pending and the debounce is re-armed, so the
    /// next poll, blur or close tries again.
    pub fn flush(&mut self) -> bool {
        self.debounce.cancel();
        if !self.dirty {
            return false;
        }

        if self.messenger.send_to(&self.owner, &self.saved_message()) {
            self.dirty = false;
            return true;
        }
        tracing::warn!(event = "note_not_delivered", task_id = %self.task_id, owner = %self.owner);
        self.debounce.arm(Instant::now());
        false
    }

    pub fn blur(&mut self) -> bool {
        self.flush()
    }

    /// Final flush, then remove the window. An edit the owner could not take
    /// gets one bounded retry first.
    pub async fn close(&mut self) {
        if !self.flush() && self.dirty {
            let delivered = match self.messenger.find_by_id(&self.owner) {
                Some(owner) => {
                    self.messenger
                        .send_with_retry(&owner, &self.saved_message())
                        .await
                }
                None => false,
            };
            if !delivered {
                tracing::error!(event = "note_lost_on_close", task_id = %self.task_id, owner = %self.owner);
            }
            self.dirty = false;
            self.debounce.cancel();
        }
        let id = self.messenger.self_id().clone();
        self.messenger.host().close(&id);
    }

    fn on_context_update(&mut self, task_id: String, task_title: String, context_text: String) {
        if task_id == self.task_id {
            // The owner's copy wins over a pending echo of older text
            self.debounce.cancel();
            self.dirty = false;
        } else {
            if !self.flush() && self.dirty {
                tracing::warn!(event = "note_dropped_on_retarget", task_id = %self.task_id);
            }
            self.debounce.cancel();
            self.dirty = false;
            tracing::debug!(event = "editor_retargeted", from = %self.task_id, to = %task_id);
            self.task_id = task_id;
        }
        self.task_title = task_title;
        self.buffer = context_text;
    }

    fn on_context_focus(&mut self) {
        let id = self.messenger.self_id().clone();
        self.messenger.host().focus(&id);
    }

    pub fn inbox() -> Inbox<Self> {
        Inbox::<Self>::new()
            .on("context_update", |editor, _from, msg| {
                if let WindowMessage::ContextUpdate {
                    task_id,
                    task_title,
                    context_text,
                } = msg
                {
                    editor.on_context_update(task_id, task_title, context_text);
                }
            })
            .on("context_focus", |editor, _from, _msg| editor.on_context_focus())
    }

    /// Event loop: inbound messages, local input, and the debounce deadline.
    /// Ends when the window closes or its inbox is dropped.
    pub async fn run(
        mut self,
        mut inbox_rx: mpsc::UnboundedReceiver<Envelope>,
        mut input: mpsc::Receiver<EditorInput>,
    ) {
        let inbox = Self::inbox();

        loop {
            let deadline = self.debounce.deadline();

            tokio::select! {
                envelope = inbox_rx.recv() => match envelope {
                    Some(envelope) => {
                        inbox.dispatch(&mut self, &envelope);
                    }
                    None => {
                        self.flush();
                        break;
                    }
                },

                event = input.recv() => match event {
                    Some(EditorInput::Edit(text)) => self.edit(text, Instant::now()),
                    Some(EditorInput::Blur) => {
                        self.blur();
                    }
                    Some(EditorInput::Close) | None => {
                        self.close().await;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.poll(Instant::now());
                }
            }
        }

        tracing::debug!(event = "editor_stopped", task_id = %self.task_id);
    }
}
