// Environment configuration helpers for the sticky-notes core
// Handles the data directory, snapshot paths, and debounce/retry tunables

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "STICKY_TASKS_DIR";

/// Configuration for on-disk paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the snapshot document and its lock file
    pub data_dir: PathBuf,
    /// Debounce and retry tunables shared by the engine and window controllers
    pub timings: Timings,
}

/// Debounce windows and retry budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Delay before a state change is written to disk
    pub persist_debounce: Duration,
    /// Delay before a window-geometry change is written (coalesces drags)
    pub bounds_debounce: Duration,
    /// Delay before a note-editor edit is pushed to the owner window
    pub note_debounce: Duration,
    /// Delay before a settings-panel edit is pushed (immediate)
    pub settings_debounce: Duration,
    /// Attempts made by the "focus me" handshake to a freshly created window
    pub handshake_attempts: u32,
    /// Fixed delay between handshake attempts
    pub handshake_delay: Duration,
    /// How long a removed task can still be restored
    pub undo_window: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            persist_debounce: Duration::from_millis(300),
            bounds_debounce: Duration::from_millis(1000),
            note_debounce: Duration::from_millis(450),
            settings_debounce: Duration::ZERO,
            handshake_attempts: 5,
            handshake_delay: Duration::from_millis(100),
            undo_window: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Create configuration using default paths
    pub fn default_paths() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            timings: Timings::default(),
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        if let Ok(override_dir) = std::env::var(DATA_DIR_ENV) {
            if !override_dir.trim().is_empty() {
                return Self {
                    data_dir: PathBuf::from(override_dir),
                    timings: Timings::default(),
                };
            }
        }

        Self::default_paths()
    }

    /// Build a configuration rooted at an explicit directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            timings: Timings::default(),
        }
    }

    fn default_data_dir() -> PathBuf {
        // Platform data dir first, then ~/.sticky-tasks, then /tmp
        dirs::data_dir()
            .map(|d| d.join("sticky-tasks"))
            .or_else(|| dirs::home_dir().map(|h| h.join(".sticky-tasks")))
            .unwrap_or_else(|| PathBuf::from("/tmp/sticky-tasks"))
    }

    /// Get the data directory
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Get the snapshot document path
    pub fn snapshot_file(&self) -> PathBuf {
        self.data_dir.join("snapshot.json")
    }

    /// Get the lock file guarding snapshot writes
    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join(".snapshot.lock")
    }

    /// Ensure the data directory exists
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
