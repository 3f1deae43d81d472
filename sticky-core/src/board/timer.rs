//! Per-task focus-timer state machine.
//!
//! Everything here is a pure function of (task, now). The engine layers the
//! cross-task rules on top: the single-runner slot, reordering on overtime,
//! and notifications.

use super::model::{FocusState, Task, MIN_FOCUS_SECS};

/// What a call to [`advance`] did to a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Whole seconds consumed from the checkpoint
    pub elapsed_secs: u64,
    /// Countdown reached zero during this advance
    pub entered_overtime: bool,
}

impl TickOutcome {
    pub fn changed(&self) -> bool {
        self.elapsed_secs > 0
    }
}

/// Whole seconds between the checkpoint and `now_ms`, never negative
pub fn elapsed_secs(last_tick_at_ms: i64, now_ms: i64) -> u64 {
    let delta = now_ms.saturating_sub(last_tick_at_ms);
    if delta <= 0 {
        0
    } else {
        (delta / 1000) as u64
    }
}

/// Apply the wall-clock time since the task's checkpoint.
///
/// Used both by the 1-second tick and by the catch-up pass on load. A
/// sub-second call is a no-op so re-entrant ticks cannot double count. The
/// checkpoint moves by whole seconds only; the sub-second remainder counts
/// toward the next tick.
pub fn advance(task: &mut Task, now_ms: i64) -> TickOutcome {
    if !task.focus_state.is_ticking() {
        return TickOutcome::default();
    }
    let Some(last) = task.last_tick_at_ms else {
        return TickOutcome::default();
    };

    let elapsed = elapsed_secs(last, now_ms);
    if elapsed == 0 {
        return TickOutcome::default();
    }

    let mut outcome = TickOutcome {
        elapsed_secs: elapsed,
        entered_overtime: false,
    };

    match task.focus_state {
        FocusState::Running => {
            if elapsed >= task.focus_remaining_sec {
                let leftover = elapsed - task.focus_remaining_sec;
                task.focus_remaining_sec = 0;
                task.focus_state = FocusState::Overtime;
                task.overtime_sec = task.overtime_sec.saturating_add(leftover);
                outcome.entered_overtime = true;
            } else {
                task.focus_remaining_sec -= elapsed;
            }
        }
        FocusState::Overtime => {
            task.overtime_sec = task.overtime_sec.saturating_add(elapsed);
        }
        FocusState::Idle | FocusState::Paused => {}
    }

    task.last_tick_at_ms = Some(last.saturating_add(elapsed as i64 * 1000));
    outcome
}

/// Start or resume the countdown. Returns false if nothing changed.
pub fn start(task: &mut Task, now_ms: i64) -> bool {
    match task.focus_state {
        FocusState::Idle => {
            task.focus_remaining_sec = task.focus_duration_sec;
            task.overtime_sec = 0;
            task.focus_state = FocusState::Running;
            task.last_tick_at_ms = Some(now_ms);
            true
        }
        FocusState::Paused => {
            task.focus_state = if task.focus_remaining_sec == 0 {
                FocusState::Overtime
            } else {
                FocusState::Running
            };
            task.last_tick_at_ms = Some(now_ms);
            true
        }
        FocusState::Running => false,
        FocusState::Overtime => {
            // Keep overtime accounting; only repair a missing checkpoint
            if task.last_tick_at_ms.is_none() {
                task.last_tick_at_ms = Some(now_ms);
                true
            } else {
                false
            }
        }
    }
}

/// Settle elapsed time, then pause. Returns the settlement outcome, or
/// `None` if the timer was not ticking.
pub fn pause(task: &mut Task, now_ms: i64) -> Option<TickOutcome> {
    if !task.focus_state.is_ticking() {
        return None;
    }
    let outcome = advance(task, now_ms);
    task.focus_state = FocusState::Paused;
    task.last_tick_at_ms = None;
    Some(outcome)
}

/// Back to Idle with a full countdown, enforcing the minimum duration
pub fn reset(task: &mut Task) {
    task.focus_duration_sec = task.focus_duration_sec.max(MIN_FOCUS_SECS);
    task.reset_timer();
}
