// Sticky-notes task board core: the task/focus engine, snapshot persistence,
// and the message protocol that keeps satellite windows in sync with the
// main window.

pub mod board;
pub mod config;
pub mod logging;
pub mod notify;
pub mod store;
pub mod windows;

// Polling helpers for async tests (only compiled with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
