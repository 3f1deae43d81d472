//! The task/focus engine.
//!
//! Single writer of the board. Every mutating operation runs synchronously
//! against in-memory state and then commits: bump the revision, hand the new
//! snapshot to the save scheduler, broadcast [`BoardEvent::Changed`], and
//! switch the 1-second tick on or off. Unknown ids are silent no-ops.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::admission::{self, Rebalance};
use super::clock::{Clock, TickControl};
use super::model::{FocusState, Settings, Snapshot, Task, TaskStatus, WindowBounds};
use super::timer::{self, TickOutcome};
use crate::config::Timings;
use crate::notify::{FocusAlert, Notifier};
use crate::store::{SaveScheduler, SnapshotStore};

const EVENT_CAPACITY: usize = 64;

/// Change notifications for observers of the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// Board state changed; `revision` increases with every commit
    Changed { revision: u64 },
    /// Soft, dismissible message for the user
    Feedback { message: String },
}

/// Result of [`Engine::add_tasks`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: usize,
    /// New tasks parked as Suspended because the active set was full
    pub suspended: usize,
}

/// A deleted task, kept so the deletion can be undone
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedTask {
    pub task: Task,
    /// Position the task occupied before removal
    pub index: usize,
    pub removed_at_ms: i64,
}

/// Collaborators injected into the engine
pub struct EngineParts {
    pub store: Arc<dyn SnapshotStore>,
    pub saver: Box<dyn SaveScheduler>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub ticker: Box<dyn TickControl>,
    pub timings: Timings,
}

pub struct Engine {
    tasks: Vec<Task>,
    settings: Settings,
    current_task_id: Option<String>,
    revision: u64,
    store: Arc<dyn SnapshotStore>,
    saver: Box<dyn SaveScheduler>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    ticker: Box<dyn TickControl>,
    timings: Timings,
    events: broadcast::Sender<BoardEvent>,
}

impl Engine {
    /// An empty board; call [`Engine::load`] to read persisted state
    pub fn new(parts: EngineParts) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tasks: Vec::new(),
            settings: Settings::default(),
            current_task_id: None,
            revision: 0,
            store: parts.store,
            saver: parts.saver,
            clock: parts.clock,
            notifier: parts.notifier,
            ticker: parts.ticker,
            timings: parts.timings,
            events,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Tasks in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task_id.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_count(&self) -> usize {
        admission::active_count(&self.tasks)
    }

    /// True while some timer is Running or in Overtime
    pub fn needs_tick(&self) -> bool {
        self.tasks.iter().any(|t| t.focus_state.is_ticking())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            settings: self.settings.clone(),
            current_task_id: self.current_task_id.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Read the persisted snapshot, repair it, and catch up on time that
    /// passed while the process was not running.
    pub fn load(&mut self) {
        let snapshot = self.store.load();
        let now_ms = self.clock.now_ms();

        self.settings = snapshot.settings.normalized();
        self.current_task_id = snapshot.current_task_id;
        self.tasks = snapshot.tasks;

        let default_secs = self.settings.default_focus_secs();
        let mut seen = HashSet::new();
        self.tasks.retain(|t| !t.text.trim().is_empty());
        for task in &mut self.tasks {
            if task.id.is_empty() || !seen.insert(task.id.clone()) {
                task.id = uuid::Uuid::new_v4().to_string();
                seen.insert(task.id.clone());
            }
            if task.focus_duration_sec == 0 {
                task.focus_duration_sec = default_secs;
            }
            task.focus_remaining_sec = task.focus_remaining_sec.min(task.focus_duration_sec);
            if task.status != TaskStatus::Todo {
                task.reset_timer();
            } else if task.focus_state.is_ticking() && task.last_tick_at_ms.is_none() {
                task.focus_state = FocusState::Paused;
            } else if !task.focus_state.is_ticking() {
                task.last_tick_at_ms = None;
            }
        }
        self.resequence();

        // Catch up every ticking timer, then keep a single runner
        let mut overtime = Vec::new();
        for task in &mut self.tasks {
            if timer::advance(task, now_ms).entered_overtime {
                overtime.push(task.id.clone());
            }
        }
        let keep = self
            .current_task_id
            .clone()
            .filter(|id| self.task(id).is_some_and(|t| t.focus_state.is_ticking()))
            .or_else(|| {
                self.tasks
                    .iter()
                    .find(|t| t.focus_state.is_ticking())
                    .map(|t| t.id.clone())
            });
        self.demote_runners(keep.as_deref(), now_ms);
        self.finish_overtime(overtime);

        self.rebalance();
        if !self
            .current_task_id
            .as_deref()
            .is_some_and(|id| self.task(id).is_some_and(Task::is_active))
        {
            self.current_task_id = None;
        }

        tracing::info!(
            event = "board_loaded",
            tasks = self.tasks.len(),
            active = self.active_count(),
            ticking = self.needs_tick()
        );
        self.commit();
    }

    /// Ask the save scheduler to write any pending snapshot now
    pub fn flush(&mut self) {
        self.saver.flush();
    }

    // ------------------------------------------------------------------
    // Task collection
    // ------------------------------------------------------------------

    /// Add one task per trimmed, non-empty line. Lines beyond the free
    /// active capacity become Suspended.
    pub fn add_tasks<I, S>(&mut self, input: I) -> AddOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = input
            .into_iter()
            .flat_map(|chunk| {
                chunk
                    .as_ref()
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        if lines.is_empty() {
            return AddOutcome::default();
        }

        let now = self.clock.now();
        let duration = self.settings.default_focus_secs();
        let mut capacity = admission::capacity(&self.tasks);
        let mut outcome = AddOutcome::default();

        for text in lines {
            let mut task = Task::new(text, self.tasks.len() as i64, duration, now);
            if capacity > 0 {
                capacity -= 1;
            } else {
                task.status = TaskStatus::Suspended;
                outcome.suspended += 1;
            }
            outcome.added += 1;
            self.tasks.push(task);
        }

        self.rebalance();
        tracing::info!(
            event = "tasks_added",
            added = outcome.added,
            suspended = outcome.suspended
        );
        if outcome.suspended > 0 {
            self.suspension_feedback(outcome.suspended);
        }
        self.commit();
        outcome
    }

    /// Rename a task. Empty text is ignored. Returns true if it changed.
    pub fn update_task_text(&mut self, id: &str, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.tasks[idx].text == text {
            return false;
        }
        self.tasks[idx].text = text.to_string();
        self.commit();
        true
    }

    /// Replace a task's note and stamp `context_updated_at`
    pub fn update_task_context(&mut self, id: &str, text: &str) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let now = self.clock.now();
        let task = &mut self.tasks[idx];
        task.context_text = text.to_string();
        task.context_updated_at = Some(now);
        self.commit();
        true
    }

    /// Done ↔ open. Finishing a task stops and resets its timer; reopening
    /// lands in Todo or Suspended depending on free capacity.
    pub fn toggle_done(&mut self, id: &str) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        let now = self.clock.now();

        if self.tasks[idx].status == TaskStatus::Done {
            let status = if admission::capacity(&self.tasks) > 0 {
                TaskStatus::Todo
            } else {
                TaskStatus::Suspended
            };
            let task = &mut self.tasks[idx];
            task.status = status;
            task.done_at = None;
            tracing::debug!(event = "task_reopened", id, status = %status);
            if status == TaskStatus::Suspended {
                self.suspension_feedback(1);
            }
        } else {
            let task = &mut self.tasks[idx];
            task.status = TaskStatus::Done;
            task.done_at = Some(now);
            task.reset_timer();
            if self.current_task_id.as_deref() == Some(id) {
                self.current_task_id = None;
            }
            tracing::debug!(event = "task_done", id);
        }

        self.rebalance();
        self.commit();
    }

    /// Delete a task, returning what is needed to undo the deletion
    pub fn remove_task(&mut self, id: &str) -> Option<RemovedTask> {
        let index = self.index_of(id)?;
        let task = self.tasks.remove(index);
        self.renumber();
        if self.current_task_id.as_deref() == Some(id) {
            self.current_task_id = None;
        }
        self.rebalance();
        self.commit();

        Some(RemovedTask {
            task,
            index,
            removed_at_ms: self.clock.now_ms(),
        })
    }

    /// Put a removed task back at its old position. Fails once the undo
    /// window has passed or if the id is already on the board.
    pub fn restore_task(&mut self, removed: RemovedTask) -> bool {
        let age_ms = self.clock.now_ms().saturating_sub(removed.removed_at_ms);
        if age_ms > self.timings.undo_window.as_millis() as i64 {
            tracing::debug!(event = "restore_expired", id = %removed.task.id, age_ms);
            return false;
        }
        if self.index_of(&removed.task.id).is_some() {
            return false;
        }

        let mut task = removed.task;
        if task.focus_state.is_ticking() && self.needs_tick() {
            // Someone else took the run slot meanwhile
            task.focus_state = FocusState::Paused;
            task.last_tick_at_ms = None;
        }
        let index = removed.index.min(self.tasks.len());
        self.tasks.insert(index, task);
        self.renumber();
        self.rebalance();
        self.commit();
        true
    }

    /// Select a task. Any other running timer is paused first.
    pub fn set_current_task(&mut self, id: &str) {
        if self.current_task_id.as_deref() == Some(id) {
            return;
        }
        if !self.task(id).is_some_and(Task::is_active) {
            return;
        }
        let now_ms = self.clock.now_ms();
        self.demote_runners(Some(id), now_ms);
        self.current_task_id = Some(id.to_string());
        self.commit();
    }

    // ------------------------------------------------------------------
    // Focus timer
    // ------------------------------------------------------------------

    /// Start or resume a task's timer; it becomes the only runner
    pub fn start_task(&mut self, id: &str) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        if !self.tasks[idx].is_active() {
            return;
        }
        let now_ms = self.clock.now_ms();
        self.demote_runners(Some(id), now_ms);

        // Demotion may reorder the board
        let Some(idx) = self.index_of(id) else {
            return;
        };
        if timer::start(&mut self.tasks[idx], now_ms) {
            tracing::debug!(event = "timer_started", id, state = %self.tasks[idx].focus_state);
        }
        self.current_task_id = Some(id.to_string());
        self.commit();
    }

    pub fn pause_task(&mut self, id: &str) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        let now_ms = self.clock.now_ms();
        let Some(outcome) = timer::pause(&mut self.tasks[idx], now_ms) else {
            return;
        };
        if outcome.entered_overtime {
            self.finish_overtime(vec![id.to_string()]);
        }
        self.commit();
    }

    /// Back to an Idle, full countdown. Suspended tasks are left alone.
    pub fn reset_task(&mut self, id: &str) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        if self.tasks[idx].status == TaskStatus::Suspended {
            return;
        }
        timer::reset(&mut self.tasks[idx]);
        self.commit();
    }

    /// One pass of the 1-second tick. Returns true if any timer moved.
    pub fn tick(&mut self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut moved = false;
        let mut overtime = Vec::new();

        for task in &mut self.tasks {
            let outcome: TickOutcome = timer::advance(task, now_ms);
            moved |= outcome.changed();
            if outcome.entered_overtime {
                overtime.push(task.id.clone());
            }
        }
        if !moved {
            return false;
        }

        self.finish_overtime(overtime);
        self.commit();
        true
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Replace the settings. Window bounds stay owned by the main window.
    pub fn update_settings(&mut self, settings: Settings) -> bool {
        let mut settings = settings.normalized();
        settings.window_bounds = self.settings.window_bounds;
        if settings == self.settings {
            return false;
        }

        let minutes = settings.default_focus_minutes;
        self.settings = Settings {
            default_focus_minutes: self.settings.default_focus_minutes,
            ..settings
        };
        self.resize_default_durations(minutes);
        self.commit();
        true
    }

    /// Change the default focus length, resizing tasks still at the old default
    pub fn update_default_focus_minutes(&mut self, minutes: u32) -> bool {
        if !self.resize_default_durations(minutes) {
            return false;
        }
        self.commit();
        true
    }

    /// Record the main window geometry; written with a longer debounce
    pub fn update_window_bounds(&mut self, bounds: WindowBounds) {
        if self.settings.window_bounds == Some(bounds) {
            return;
        }
        self.settings.window_bounds = Some(bounds);
        self.commit_with_delay(self.timings.bounds_debounce);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn index_of(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Sort by `order`, then renumber 0..n
    fn resequence(&mut self) {
        self.tasks.sort_by_key(|t| t.order);
        self.renumber();
    }

    /// Renumber 0..n in current vector position
    fn renumber(&mut self) {
        for (i, task) in self.tasks.iter_mut().enumerate() {
            task.order = i as i64;
        }
    }

    fn rebalance(&mut self) -> Rebalance {
        let result = admission::rebalance(&mut self.tasks);
        if !result.is_empty() {
            tracing::debug!(
                event = "admission_rebalanced",
                demoted = result.demoted.len(),
                promoted = result.promoted.len()
            );
        }
        if let Some(current) = self.current_task_id.as_deref() {
            if result.demoted.iter().any(|id| id == current) {
                self.current_task_id = None;
            }
        }
        result
    }

    /// Pause every ticking timer except `keep`, settling elapsed time first
    fn demote_runners(&mut self, keep: Option<&str>, now_ms: i64) {
        let mut overtime = Vec::new();
        for task in &mut self.tasks {
            if Some(task.id.as_str()) == keep || !task.focus_state.is_ticking() {
                continue;
            }
            if let Some(outcome) = timer::pause(task, now_ms) {
                if outcome.entered_overtime {
                    overtime.push(task.id.clone());
                }
                tracing::debug!(event = "runner_demoted", id = %task.id);
            }
        }
        self.finish_overtime(overtime);
    }

    /// Move tasks that just entered overtime to the bottom and alert the user
    fn finish_overtime(&mut self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        let bottom = self.tasks.len() as i64;
        for (offset, id) in ids.iter().enumerate() {
            if let Some(idx) = self.index_of(id) {
                self.tasks[idx].order = bottom + offset as i64;
            }
        }
        self.resequence();

        for id in ids {
            let Some(task) = self.task(&id) else {
                continue;
            };
            tracing::info!(event = "overtime_started", id = %task.id);
            if !self.settings.notifications_enabled {
                continue;
            }
            let alert = FocusAlert::overtime_started(&task.id, &task.text);
            if let Err(e) = self.notifier.notify(&alert) {
                tracing::warn!(event = "notify_failed", id = %alert.task_id, error = %e);
            }
        }
    }

    fn resize_default_durations(&mut self, minutes: u32) -> bool {
        let old_secs = self.settings.default_focus_secs();
        let minutes = minutes.clamp(1, 240);
        if minutes == self.settings.default_focus_minutes {
            return false;
        }
        self.settings.default_focus_minutes = minutes;
        let new_secs = self.settings.default_focus_secs();

        for task in &mut self.tasks {
            if task.focus_duration_sec == old_secs && task.timer_untouched() {
                task.focus_duration_sec = new_secs;
                task.focus_remaining_sec = new_secs;
            }
        }
        true
    }

    fn feedback(&self, message: String) {
        let _ = self.events.send(BoardEvent::Feedback { message });
    }

    fn suspension_feedback(&self, count: usize) {
        self.feedback(format!(
            "{} task(s) were suspended: at most {} can be active",
            count,
            admission::ACTIVE_LIMIT
        ));
    }

    fn commit(&mut self) {
        self.commit_with_delay(self.timings.persist_debounce);
    }

    fn commit_with_delay(&mut self, delay: Duration) {
        self.revision += 1;
        self.saver.schedule(self.snapshot(), delay);
        let _ = self.events.send(BoardEvent::Changed {
            revision: self.revision,
        });
        let ticking = self.needs_tick();
        self.ticker.set_ticking(ticking);
    }
}
