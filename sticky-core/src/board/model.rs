//! Board data model: tasks, settings, and the persisted snapshot.
//!
//! Encoding is plain serde. Decoding goes through [`serde_json::Value`] and
//! reads each field independently so that a single bad field falls back to
//! its default instead of failing the whole document.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Default focus duration in minutes for a fresh install
pub const DEFAULT_FOCUS_MINUTES: u32 = 25;

/// Shortest focus duration a reset will leave behind
pub const MIN_FOCUS_SECS: u64 = 60;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,
    /// Over the admission limit; waits for a free slot
    Suspended,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "Todo"),
            TaskStatus::Suspended => write!(f, "Suspended"),
            TaskStatus::Done => write!(f, "Done"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Todo" => Ok(TaskStatus::Todo),
            "Suspended" => Ok(TaskStatus::Suspended),
            "Done" => Ok(TaskStatus::Done),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Focus-timer state of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusState {
    #[default]
    Idle,
    Running,
    Paused,
    /// Countdown hit zero and the timer keeps counting upward
    Overtime,
}

impl FocusState {
    /// True for the states that consume wall-clock time
    pub fn is_ticking(self) -> bool {
        matches!(self, FocusState::Running | FocusState::Overtime)
    }
}

impl std::fmt::Display for FocusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusState::Idle => write!(f, "Idle"),
            FocusState::Running => write!(f, "Running"),
            FocusState::Paused => write!(f, "Paused"),
            FocusState::Overtime => write!(f, "Overtime"),
        }
    }
}

/// One to-do item with its focus timer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    /// Display rank; contiguous 0..n across the board
    pub order: i64,
    pub context_text: String,
    pub context_updated_at: Option<DateTime<Utc>>,
    pub focus_state: FocusState,
    pub focus_duration_sec: u64,
    pub focus_remaining_sec: u64,
    pub overtime_sec: u64,
    /// Wall-clock checkpoint; only set while Running or Overtime
    pub last_tick_at_ms: Option<i64>,
}

impl Task {
    pub fn new(text: String, order: i64, duration_sec: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            status: TaskStatus::Todo,
            created_at: now,
            done_at: None,
            order,
            context_text: String::new(),
            context_updated_at: None,
            focus_state: FocusState::Idle,
            focus_duration_sec: duration_sec,
            focus_remaining_sec: duration_sec,
            overtime_sec: 0,
            last_tick_at_ms: None,
        }
    }

    /// Neither Done nor Suspended
    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Todo
    }

    /// Back to Idle with a full countdown and no overtime
    pub fn reset_timer(&mut self) {
        self.focus_state = FocusState::Idle;
        self.focus_remaining_sec = self.focus_duration_sec;
        self.overtime_sec = 0;
        self.last_tick_at_ms = None;
    }

    /// Idle at full duration, i.e. never touched since the last reset
    pub fn timer_untouched(&self) -> bool {
        self.focus_state == FocusState::Idle
            && self.focus_remaining_sec == self.focus_duration_sec
            && self.overtime_sec == 0
    }

    fn from_value(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let duration = field::<u64>(raw, "focusDurationSec")
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_FOCUS_MINUTES as u64 * 60);

        Some(Self {
            id: field(raw, "id").unwrap_or_default(),
            text: field(raw, "text").unwrap_or_default(),
            status: field(raw, "status").unwrap_or_default(),
            created_at: field(raw, "createdAt").unwrap_or_else(Utc::now),
            done_at: field(raw, "doneAt"),
            order: field(raw, "order").unwrap_or_default(),
            context_text: field(raw, "contextText").unwrap_or_default(),
            context_updated_at: field(raw, "contextUpdatedAt"),
            focus_state: field(raw, "focusState").unwrap_or_default(),
            focus_duration_sec: duration,
            // Missing or unreadable remaining means "full"; the engine clamps on load
            focus_remaining_sec: field(raw, "focusRemainingSec").unwrap_or(duration),
            overtime_sec: field(raw, "overtimeSec").unwrap_or_default(),
            last_tick_at_ms: field(raw, "lastTickAtMs"),
        })
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Task::from_value(&raw).ok_or_else(|| serde::de::Error::custom("task must be an object"))
    }
}

/// Last known main-window geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Process-wide preferences
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub pin_on_top: bool,
    /// Window opacity, 0.3..=1.0
    pub opacity: f64,
    pub show_only_active: bool,
    pub font_scale: f64,
    pub default_focus_minutes: u32,
    pub notifications_enabled: bool,
    pub window_bounds: Option<WindowBounds>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pin_on_top: true,
            opacity: 0.95,
            show_only_active: false,
            font_scale: 1.0,
            default_focus_minutes: DEFAULT_FOCUS_MINUTES,
            notifications_enabled: true,
            window_bounds: None,
        }
    }
}

impl Settings {
    pub const MIN_OPACITY: f64 = 0.3;
    pub const MAX_OPACITY: f64 = 1.0;

    /// Clamp every numeric preference into its allowed range
    pub fn normalized(mut self) -> Self {
        self.opacity = clamp_f64(self.opacity, Self::MIN_OPACITY, Self::MAX_OPACITY, 0.95);
        self.font_scale = clamp_f64(self.font_scale, 0.8, 1.6, 1.0);
        self.default_focus_minutes = self.default_focus_minutes.clamp(1, 240);
        self
    }

    pub fn default_focus_secs(&self) -> u64 {
        self.default_focus_minutes as u64 * 60
    }

    fn from_value(raw: &Value) -> Self {
        let defaults = Settings::default();
        Self {
            pin_on_top: field(raw, "pinOnTop").unwrap_or(defaults.pin_on_top),
            opacity: field(raw, "opacity").unwrap_or(defaults.opacity),
            show_only_active: field(raw, "showOnlyActive").unwrap_or(defaults.show_only_active),
            font_scale: field(raw, "fontScale").unwrap_or(defaults.font_scale),
            default_focus_minutes: field(raw, "defaultFocusMinutes")
                .unwrap_or(defaults.default_focus_minutes),
            notifications_enabled: field(raw, "notificationsEnabled")
                .unwrap_or(defaults.notifications_enabled),
            window_bounds: field(raw, "windowBounds"),
        }
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Settings::from_value(&raw))
    }
}

fn clamp_f64(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// The unit of persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub settings: Settings,
    pub current_task_id: Option<String>,
}

impl Snapshot {
    /// Serialize as a pretty-printed JSON document
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot document. Never fails: anything unreadable decodes to
    /// an empty board with default settings, and bad tasks are skipped.
    pub fn decode(contents: &str) -> Self {
        if contents.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(contents) {
            Ok(raw) => Self::from_value(&raw),
            Err(e) => {
                tracing::warn!(event = "snapshot_unreadable", error = %e);
                Self::default()
            }
        }
    }

    fn from_value(raw: &Value) -> Self {
        let tasks = raw
            .get("tasks")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Task::from_value).collect())
            .unwrap_or_default();

        Self {
            tasks,
            settings: raw
                .get("settings")
                .map(Settings::from_value)
                .unwrap_or_default(),
            current_task_id: field(raw, "currentTaskId"),
        }
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Snapshot::from_value(&raw))
    }
}

/// Read one field, treating missing, null, and ill-typed values alike
fn field<T: DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    raw.get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task(status: TaskStatus, focus: FocusState) -> Task {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let mut task = Task::new("Write report".to_string(), 0, 1500, created);
        task.status = status;
        task.focus_state = focus;
        task
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [TaskStatus::Todo, TaskStatus::Suspended, TaskStatus::Done] {
            let parsed: TaskStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_snapshot_roundtrip_covers_all_enums() {
        let mut tasks = Vec::new();
        let combos = [
            (TaskStatus::Todo, FocusState::Idle),
            (TaskStatus::Todo, FocusState::Running),
            (TaskStatus::Todo, FocusState::Paused),
            (TaskStatus::Todo, FocusState::Overtime),
            (TaskStatus::Suspended, FocusState::Idle),
            (TaskStatus::Done, FocusState::Idle),
        ];
        for (i, (status, focus)) in combos.into_iter().enumerate() {
            let mut task = sample_task(status, focus);
            task.order = i as i64;
            if focus.is_ticking() {
                task.last_tick_at_ms = Some(1_700_000_000_123);
            }
            if status == TaskStatus::Done {
                task.done_at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
            }
            tasks.push(task);
        }
        tasks[2].context_text = "line one\nline two".to_string();
        tasks[2].context_updated_at = Some(Utc::now());

        let snapshot = Snapshot {
            tasks,
            settings: Settings {
                window_bounds: Some(WindowBounds {
                    x: -20,
                    y: 40,
                    width: 320,
                    height: 480,
                }),
                opacity: 0.42,
                ..Settings::default()
            },
            current_task_id: None,
        };

        let json = snapshot.encode().unwrap();
        assert_eq!(Snapshot::decode(&json), snapshot);
    }

    #[test]
    fn test_enums_serialize_as_symbolic_names() {
        let json = serde_json::to_string(&sample_task(TaskStatus::Suspended, FocusState::Paused))
            .unwrap();
        assert!(json.contains("\"status\":\"Suspended\""));
        assert!(json.contains("\"focusState\":\"Paused\""));
        assert!(json.contains("\"lastTickAtMs\":null"));
    }

    #[test]
    fn test_malformed_documents_decode_to_empty() {
        for input in ["", "   ", "not json", "[1,2,3]", "{\"tasks\": 7}", "null"] {
            let snapshot = Snapshot::decode(input);
            assert!(snapshot.tasks.is_empty(), "input {:?}", input);
            assert_eq!(snapshot.settings, Settings::default());
            assert!(snapshot.current_task_id.is_none());
        }
    }

    #[test]
    fn test_bad_fields_fall_back_to_defaults() {
        let json = r#"{
            "tasks": [
                {"id": "a", "text": "Keep me", "status": "Archived", "focusState": 12,
                 "focusDurationSec": "soon", "createdAt": "yesterday"},
                "garbage",
                {"id": "b", "text": "Second", "status": "Done", "order": 1}
            ],
            "settings": {"opacity": "dim", "pinOnTop": false},
            "currentTaskId": 5
        }"#;

        let snapshot = Snapshot::decode(json);
        assert_eq!(snapshot.tasks.len(), 2);

        let first = &snapshot.tasks[0];
        assert_eq!(first.status, TaskStatus::Todo);
        assert_eq!(first.focus_state, FocusState::Idle);
        assert_eq!(first.focus_duration_sec, 1500);
        assert_eq!(first.focus_remaining_sec, 1500);

        assert_eq!(snapshot.tasks[1].status, TaskStatus::Done);
        assert_eq!(snapshot.settings.opacity, Settings::default().opacity);
        assert!(!snapshot.settings.pin_on_top);
        assert!(snapshot.current_task_id.is_none());
    }

    #[test]
    fn test_settings_normalized_clamps_ranges() {
        let settings = Settings {
            opacity: 0.05,
            font_scale: 9.0,
            default_focus_minutes: 0,
            ..Settings::default()
        }
        .normalized();

        assert_eq!(settings.opacity, Settings::MIN_OPACITY);
        assert_eq!(settings.font_scale, 1.6);
        assert_eq!(settings.default_focus_minutes, 1);
    }
}
