// Debounce deadlines for satellite edit buffers

use std::time::Duration;
use tokio::time::Instant;

/// Trailing-edge debounce deadline for one local edit buffer
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// (Re)start the window from `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
