// Window launch payload
// Every window starts with one of these; later changes travel as messages

use super::WindowId;
use crate::board::model::Settings;
use serde::{Deserialize, Serialize};

/// Identifies a window's kind and its initial data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowPayload {
    /// The task list; also the fallback for anything undecodable
    #[default]
    Main,
    /// Note editor bound to one task
    #[serde(rename_all = "camelCase")]
    NoteEditor {
        #[serde(default)]
        task_id: String,
        #[serde(default)]
        task_title: String,
        #[serde(default)]
        context_text: String,
        #[serde(default)]
        owner_window_id: WindowId,
    },
    /// Settings panel seeded with the owner's current settings
    #[serde(rename_all = "camelCase")]
    Settings {
        #[serde(default)]
        owner_window_id: WindowId,
        #[serde(default)]
        settings: Settings,
    },
}

impl WindowPayload {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Never fails: empty, unparseable, or unknown input is `Main`
    pub fn decode(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return WindowPayload::Main;
        }
        match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(event = "payload_fallback", error = %e);
                WindowPayload::Main
            }
        }
    }

    /// Task shown by a note editor
    pub fn note_task_id(&self) -> Option<&str> {
        match self {
            WindowPayload::NoteEditor { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    pub fn is_note_editor(&self) -> bool {
        matches!(self, WindowPayload::NoteEditor { .. })
    }

    pub fn is_settings(&self) -> bool {
        matches!(self, WindowPayload::Settings { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WindowPayload::Main => "main",
            WindowPayload::NoteEditor { .. } => "note_editor",
            WindowPayload::Settings { .. } => "settings",
        }
    }
}
