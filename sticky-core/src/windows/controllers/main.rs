//! Main window controller.
//!
//! Owns the [`Engine`] and is the only writer of board state. Satellites
//! report edits through the inbox; the main window pushes authoritative
//! changes back to whichever satellite shows the affected data.

use crate::board::clock::LoopTicker;
use crate::board::engine::{Engine, RemovedTask};
use crate::board::model::{Settings, WindowBounds};
use crate::windows::host::WindowHandle;
use crate::windows::messenger::{Inbox, Messenger};
use crate::windows::payload::WindowPayload;
use crate::windows::protocol::{Envelope, WindowMessage};
use crate::windows::WindowId;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Local UI events for the main window
#[derive(Debug, Clone, PartialEq)]
pub enum MainInput {
    Add(String),
    Rename { id: String, text: String },
    ToggleDone(String),
    Remove(String),
    /// Restore the most recently removed task
    Undo,
    Select(String),
    Start(String),
    Pause(String),
    Reset(String),
    OpenNote(String),
    OpenSettings,
    ApplySettings(Settings),
    FocusMinutes(u32),
    Bounds(WindowBounds),
    Quit,
}

pub struct MainWindow {
    engine: Engine,
    messenger: Messenger,
    ticker: LoopTicker,
    /// Task shown by each editor that was re-targeted since launch
    editor_targets: HashMap<WindowId, String>,
    settings_window: Option<WindowId>,
    /// Satellites that asked for a fully opaque main window
    opaque_holders: HashSet<WindowId>,
    last_removed: Option<RemovedTask>,
}

impl MainWindow {
    /// `ticker` must be the one handed to the engine
    pub fn new(engine: Engine, messenger: Messenger, ticker: LoopTicker) -> Self {
        Self {
            engine,
            messenger,
            ticker,
            editor_targets: HashMap::new(),
            settings_window: None,
            opaque_holders: HashSet::new(),
            last_removed: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn id(&self) -> &WindowId {
        self.messenger.self_id()
    }

    /// Configured opacity, or fully opaque while a satellite is open
    pub fn effective_opacity(&self) -> f64 {
        if self.opaque_holders.is_empty() {
            self.engine.settings().opacity
        } else {
            1.0
        }
    }

    pub fn settings_window(&self) -> Option<&WindowId> {
        self.settings_window.as_ref()
    }

    // ------------------------------------------------------------------
    // Satellites
    // ------------------------------------------------------------------

    fn editor_task<'a>(&'a self, handle: &'a WindowHandle) -> Option<&'a str> {
        self.editor_targets
            .get(&handle.id)
            .map(String::as_str)
            .or_else(|| handle.payload.note_task_id())
    }

    /// The open editor currently showing `task_id`
    pub fn editor_for(&self, task_id: &str) -> Option<WindowHandle> {
        self.messenger.find_by_predicate(|w| {
            w.payload.is_note_editor() && self.editor_task(w) == Some(task_id)
        })
    }

    fn context_update(&self, task_id: &str) -> Option<WindowMessage> {
        let task = self.engine.task(task_id)?;
        Some(WindowMessage::ContextUpdate {
            task_id: task.id.clone(),
            task_title: task.text.clone(),
            context_text: task.context_text.clone(),
        })
    }

    /// Show a task's note. Reuses an editor already showing the task, else
    /// re-targets any open editor, else launches a new one.
    pub async fn open_note_editor(&mut self, task_id: &str) -> Option<WindowId> {
        let update = self.context_update(task_id)?;

        let live: HashSet<WindowId> = self
            .messenger
            .host()
            .windows()
            .into_iter()
            .map(|w| w.id)
            .collect();
        self.editor_targets.retain(|id, _| live.contains(id));

        if let Some(editor) = self.editor_for(task_id) {
            self.messenger.send(&editor, &WindowMessage::ContextFocus);
            return Some(editor.id);
        }

        if let Some(editor) = self.messenger.find_by_predicate(|w| w.payload.is_note_editor()) {
            self.messenger.send(&editor, &update);
            self.messenger.send(&editor, &WindowMessage::ContextFocus);
            self.editor_targets
                .insert(editor.id.clone(), task_id.to_string());
            return Some(editor.id);
        }

        let WindowMessage::ContextUpdate {
            task_id,
            task_title,
            context_text,
        } = update
        else {
            return None;
        };
        let payload = WindowPayload::NoteEditor {
            task_id,
            task_title,
            context_text,
            owner_window_id: self.id().clone(),
        };
        let editor = match self.messenger.host().create(payload) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(event = "editor_launch_failed", error = %e);
                return None;
            }
        };
        self.messenger
            .send_with_retry(&editor, &WindowMessage::ContextFocus)
            .await;
        Some(editor.id)
    }

    /// Focus the settings panel, launching it if needed
    pub fn open_settings(&mut self) -> Option<WindowId> {
        if let Some(panel) = self
            .messenger
            .find_by_predicate(|w| w.payload.is_settings())
        {
            self.messenger.host().focus(&panel.id);
            self.settings_window = Some(panel.id.clone());
            return Some(panel.id);
        }

        let payload = WindowPayload::Settings {
            owner_window_id: self.id().clone(),
            settings: self.engine.settings().clone(),
        };
        match self.messenger.host().create(payload) {
            Ok(panel) => {
                self.messenger.host().focus(&panel.id);
                self.settings_window = Some(panel.id.clone());
                Some(panel.id)
            }
            Err(e) => {
                tracing::warn!(event = "settings_launch_failed", error = %e);
                None
            }
        }
    }

    /// Rename a task and refresh the editor showing it
    pub fn rename_task(&mut self, id: &str, text: &str) -> bool {
        if !self.engine.update_task_text(id, text) {
            return false;
        }
        if let (Some(editor), Some(update)) = (self.editor_for(id), self.context_update(id)) {
            self.messenger.send(&editor, &update);
        }
        true
    }

    /// Apply settings edited in the main window and mirror them to the panel
    pub fn apply_settings(&mut self, settings: Settings) -> bool {
        if !self.engine.update_settings(settings) {
            return false;
        }
        self.push_settings();
        true
    }

    pub fn set_default_focus_minutes(&mut self, minutes: u32) -> bool {
        if !self.engine.update_default_focus_minutes(minutes) {
            return false;
        }
        self.push_settings();
        true
    }

    fn push_settings(&self) {
        if let Some(panel) = &self.settings_window {
            let message = WindowMessage::SettingsUpdate {
                settings: self.engine.settings().clone(),
            };
            self.messenger.send_to(panel, &message);
        }
    }

    pub fn inbox() -> Inbox<Self> {
        Inbox::<Self>::new()
            .on("context_saved", |main, _from, msg| {
                if let WindowMessage::ContextSaved {
                    task_id,
                    context_text,
                } = msg
                {
                    main.engine.update_task_context(&task_id, &context_text);
                }
            })
            .on("settings_update", |main, _from, msg| {
                if let WindowMessage::SettingsUpdate { settings } = msg {
                    main.engine.update_settings(settings);
                }
            })
            .on("settings_opened", |main, from, _msg| {
                main.opaque_holders.insert(from.clone());
                main.settings_window = Some(from.clone());
            })
            .on("settings_closed", |main, from, _msg| {
                main.opaque_holders.remove(from);
                if main.settings_window.as_ref() == Some(from) {
                    main.settings_window = None;
                }
            })
    }

    // ------------------------------------------------------------------
    // Loop
    // ------------------------------------------------------------------

    pub async fn apply(&mut self, input: MainInput) {
        match input {
            MainInput::Add(text) => {
                self.engine.add_tasks([text]);
            }
            MainInput::Rename { id, text } => {
                self.rename_task(&id, &text);
            }
            MainInput::ToggleDone(id) => self.engine.toggle_done(&id),
            MainInput::Remove(id) => {
                if let Some(removed) = self.engine.remove_task(&id) {
                    self.last_removed = Some(removed);
                }
            }
            MainInput::Undo => {
                if let Some(removed) = self.last_removed.take() {
                    self.engine.restore_task(removed);
                }
            }
            MainInput::Select(id) => self.engine.set_current_task(&id),
            MainInput::Start(id) => self.engine.start_task(&id),
            MainInput::Pause(id) => self.engine.pause_task(&id),
            MainInput::Reset(id) => self.engine.reset_task(&id),
            MainInput::OpenNote(id) => {
                self.open_note_editor(&id).await;
            }
            MainInput::OpenSettings => {
                self.open_settings();
            }
            MainInput::ApplySettings(settings) => {
                self.apply_settings(settings);
            }
            MainInput::FocusMinutes(minutes) => {
                self.set_default_focus_minutes(minutes);
            }
            MainInput::Bounds(bounds) => self.engine.update_window_bounds(bounds),
            MainInput::Quit => {}
        }
    }

    /// Event loop: inbound messages, local input, and the 1-second tick
    /// while a timer is running. Flushes the board on the way out.
    pub async fn run(
        mut self,
        mut inbox_rx: mpsc::UnboundedReceiver<Envelope>,
        mut input: mpsc::Receiver<MainInput>,
    ) -> Engine {
        let inbox = Self::inbox();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ticking = self.ticker.is_active();

            tokio::select! {
                envelope = inbox_rx.recv() => match envelope {
                    Some(envelope) => {
                        inbox.dispatch(&mut self, &envelope);
                    }
                    None => break,
                },

                event = input.recv() => match event {
                    Some(MainInput::Quit) | None => break,
                    Some(event) => self.apply(event).await,
                },

                _ = tick.tick(), if ticking => {
                    self.engine.tick();
                }
            }
        }

        self.engine.flush();
        tracing::info!(event = "main_window_stopped", revision = self.engine.revision());
        self.engine
    }
}
