//! Focus-timer alerts.
//!
//! The engine raises a [`FocusAlert`] when a countdown runs out; delivery is
//! best effort and any failure is logged and dropped by the caller. The
//! terminal notifier emits BEL plus the OSC 9 / 777 / 99 notification escapes
//! understood by iTerm2, VTE terminals, and kitty.

use std::io::{self, Write};

/// An alert about one task's timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusAlert {
    pub task_id: String,
    pub title: String,
    pub message: String,
}

impl FocusAlert {
    /// The countdown hit zero and the task moved into overtime
    pub fn overtime_started(task_id: &str, task_text: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            title: "Focus time is up".to_string(),
            message: format!("{} is now in overtime", truncate_preview(task_text, 80)),
        }
    }
}

/// Delivers alerts to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &FocusAlert) -> io::Result<()>;
}

/// Drops every alert
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _alert: &FocusAlert) -> io::Result<()> {
        Ok(())
    }
}

/// Writes terminal notification escapes to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, alert: &FocusAlert) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(terminal_sequences(&alert.title, &alert.message).as_bytes())?;
        stdout.flush()
    }
}

/// BEL followed by the OSC 9 (iTerm2), OSC 777 (VTE), and OSC 99 (kitty) forms
fn terminal_sequences(title: &str, message: &str) -> String {
    let title = escape_osc(title);
    let message = escape_osc(message);
    format!(
        "\x07\x1b]9;{message}\x07\x1b]777;notify;{title};{message}\x07\
         \x1b]99;i=1:d=0:p=title;{title}\x1b\\\x1b]99;i=1:d=0:p=body;{message}\x1b\\"
    )
}

/// OSC payloads end at BEL or ST, so strip anything that could terminate early
fn escape_osc(s: &str) -> String {
    s.replace('\x07', "")
        .replace('\x1b', "")
        .replace('\n', " ")
        .replace('\r', "")
}

/// First line only, cut to `max_chars` with an ellipsis
fn truncate_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
