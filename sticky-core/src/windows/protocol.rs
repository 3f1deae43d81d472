// Window protocol - typed messages exchanged between the main window and
// its satellites. On the wire each message is an Envelope carrying a
// protocol version, the sender's window id, the message name, and a JSON body.

use super::WindowId;
use crate::board::model::Settings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bumped whenever a message body changes shape
pub const PROTOCOL_VERSION: u32 = 1;

/// Wire form of a [`WindowMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub from: WindowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

// ============================================================================
// Message catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "snake_case")]
pub enum WindowMessage {
    /// Owner → editor: show this task (re-targets an open editor)
    #[serde(rename_all = "camelCase")]
    ContextUpdate {
        task_id: String,
        task_title: String,
        context_text: String,
    },
    /// Owner → editor: bring to front
    ContextFocus,
    /// Editor → owner: the note text for a task
    #[serde(rename_all = "camelCase")]
    ContextSaved { task_id: String, context_text: String },
    /// Either way: full settings snapshot
    SettingsUpdate { settings: Settings },
    /// Settings → owner: a satellite is showing
    SettingsOpened,
    /// Settings → owner: the satellite went away
    SettingsClosed,
}

impl WindowMessage {
    pub fn name(&self) -> &'static str {
        match self {
            WindowMessage::ContextUpdate { .. } => "context_update",
            WindowMessage::ContextFocus => "context_focus",
            WindowMessage::ContextSaved { .. } => "context_saved",
            WindowMessage::SettingsUpdate { .. } => "settings_update",
            WindowMessage::SettingsOpened => "settings_opened",
            WindowMessage::SettingsClosed => "settings_closed",
        }
    }

    pub fn to_envelope(&self, from: &WindowId) -> Result<Envelope, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        let data = tagged
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(Envelope {
            v: PROTOCOL_VERSION,
            from: from.clone(),
            name: self.name().to_string(),
            data,
        })
    }

    /// `None` for another protocol version, an unknown name, or a body
    /// that does not match the name
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.v != PROTOCOL_VERSION {
            return None;
        }
        let mut tagged = Map::new();
        tagged.insert("name".to_string(), Value::String(envelope.name.clone()));
        if !envelope.data.is_null() {
            tagged.insert("data".to_string(), envelope.data.clone());
        }
        serde_json::from_value(Value::Object(tagged)).ok()
    }
}
