//! Active-task admission limit.
//!
//! At most [`ACTIVE_LIMIT`] tasks may be active (neither Done nor Suspended).
//! Overflow is parked as Suspended rather than rejected; freed slots are
//! refilled from the Suspended pool, oldest first.

use super::model::{Task, TaskStatus};

/// Maximum number of simultaneously active tasks
pub const ACTIVE_LIMIT: usize = 5;

/// Ids moved across the active boundary by [`rebalance`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebalance {
    pub demoted: Vec<String>,
    pub promoted: Vec<String>,
}

impl Rebalance {
    pub fn is_empty(&self) -> bool {
        self.demoted.is_empty() && self.promoted.is_empty()
    }
}

pub fn active_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_active()).count()
}

/// Free active slots
pub fn capacity(tasks: &[Task]) -> usize {
    ACTIVE_LIMIT.saturating_sub(active_count(tasks))
}

/// Bring the active set back to the limit.
///
/// Demotion prefers idle/paused tasks over ticking ones, then the highest
/// `order`. Promotion takes the lowest `order` first. Demoted tasks get an
/// Idle, full timer since a Suspended task never holds timer state.
pub fn rebalance(tasks: &mut [Task]) -> Rebalance {
    let mut result = Rebalance::default();
    let active = active_count(tasks);

    if active > ACTIVE_LIMIT {
        let mut candidates: Vec<usize> = (0..tasks.len()).filter(|&i| tasks[i].is_active()).collect();
        candidates.sort_by(|&a, &b| {
            let ta = &tasks[a];
            let tb = &tasks[b];
            ta.focus_state
                .is_ticking()
                .cmp(&tb.focus_state.is_ticking())
                .then(tb.order.cmp(&ta.order))
        });

        for &i in candidates.iter().take(active - ACTIVE_LIMIT) {
            let task = &mut tasks[i];
            task.status = TaskStatus::Suspended;
            task.reset_timer();
            result.demoted.push(task.id.clone());
        }
    } else if active < ACTIVE_LIMIT {
        let mut suspended: Vec<usize> = (0..tasks.len())
            .filter(|&i| tasks[i].status == TaskStatus::Suspended)
            .collect();
        suspended.sort_by_key(|&i| tasks[i].order);

        for &i in suspended.iter().take(ACTIVE_LIMIT - active) {
            let task = &mut tasks[i];
            task.status = TaskStatus::Todo;
            result.promoted.push(task.id.clone());
        }
    }

    result
}
