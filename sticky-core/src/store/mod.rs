// Snapshot persistence
// The whole board is one JSON document at $DATA_DIR/snapshot.json, replaced
// atomically under an exclusive lock

pub mod saver;

use crate::board::model::Snapshot;
use crate::config::Config;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub use saver::{DebouncedSaver, ImmediateSaver, SaveScheduler};

/// Loads and saves the full application snapshot
pub trait SnapshotStore: Send + Sync {
    /// Never fails: a missing or corrupt document yields an empty snapshot
    fn load(&self) -> Snapshot;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.snapshot_file(),
            lock_path: config.lock_file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Snapshot {
        if !self.path.exists() {
            return Snapshot::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => Snapshot::decode(&contents),
            Err(e) => {
                tracing::warn!(
                    event = "snapshot_read_failed",
                    path = %self.path.display(),
                    error = %e
                );
                Snapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open lock file: {}", self.lock_path.display()))?;

        // Blocks until other writers finish; released when `lock` drops
        lock.lock_exclusive()
            .with_context(|| "Failed to acquire exclusive lock on snapshot")?;

        let contents = snapshot
            .encode()
            .with_context(|| "Failed to serialize snapshot")?;
        atomic_write(&self.path, &contents)
    }
}

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Snapshot>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            saved: Mutex::new(Some(initial)),
            saves: Mutex::new(0),
        }
    }

    pub fn last_saved(&self) -> Option<Snapshot> {
        self.saved.lock().ok().and_then(|s| s.clone())
    }

    /// Number of completed `save` calls
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Snapshot {
        self.last_saved().unwrap_or_default()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        *saved = Some(snapshot.clone());
        if let Ok(mut n) = self.saves.lock() {
            *n += 1;
        }
        Ok(())
    }
}

/// Atomically replace a file using write-to-temp + fsync + rename
/// Readers never observe a half-written document
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("Invalid path: {}", path.display()))?;

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot"),
        std::process::id()
    ));

    let mut file = fs::File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync temp file: {}", temp_path.display()))?;
    drop(file);

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::model::{Settings, Task};
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path().join("state"));
        (JsonFileStore::new(&config), temp_dir)
    }

    #[test]
    fn test_file_store_roundtrip() {
        let (store, _temp) = test_store();
        let snapshot = Snapshot {
            tasks: vec![Task::new("Ship it".to_string(), 0, 1500, Utc::now())],
            settings: Settings {
                show_only_active: true,
                ..Settings::default()
            },
            current_task_id: None,
        };

        store.save(&snapshot).unwrap();
        assert_eq!(store.load(), snapshot);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let (store, _temp) = test_store();
        let snapshot = store.load();
        assert!(snapshot.tasks.is_empty());
        assert_eq!(snapshot.settings, Settings::default());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let (store, _temp) = test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{\"tasks\": [ truncated").unwrap();

        assert_eq!(store.load(), Snapshot::default());
    }

    #[test]
    fn test_atomic_write_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");

        atomic_write(&path, "{\"a\":1}").unwrap();
        atomic_write(&path, "{\"a\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::default();
        store.save(&Snapshot::default()).unwrap();
        store.save(&Snapshot::default()).unwrap();
        assert_eq!(store.save_count(), 2);
    }
}
