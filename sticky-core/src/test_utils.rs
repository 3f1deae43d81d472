//! Test utilities for async window tests
//!
//! Window controllers run as independent tokio tasks, so tests observe them
//! by polling shared state. These helpers poll with a deadline instead of
//! sleeping for an arbitrary amount of time. Deadlines use tokio's clock, so
//! they also work under `start_paused` tests.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Assert that an async condition eventually becomes true within a timeout.
///
/// Retries `f` every `interval` until it returns `Ok`, panicking with the
/// last error once `timeout` has passed.
///
/// ```rust,ignore
/// # use std::time::Duration;
/// # async fn example() {
/// use sticky_core::test_utils::assert_eventually;
///
/// assert_eventually(
///     "note to reach the board",
///     Duration::from_secs(2),
///     Duration::from_millis(20),
///     || async {
///         match store.last_saved() {
///             Some(s) if s.tasks[0].context_text == "draft" => Ok(()),
///             Some(_) => Err("note not saved yet"),
///             None => Err("nothing saved"),
///         }
///     },
/// )
/// .await;
/// # }
/// ```
pub async fn assert_eventually<F, Fut, T, E>(
    desc: &str,
    timeout: Duration,
    interval: Duration,
    mut f: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return value,
            Err(e) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    panic!(
                        "Timeout waiting for {}\n\
                         Duration: {:?}\n\
                         Attempts: {}\n\
                         Last error: {}",
                        desc, elapsed, attempt, e
                    );
                }

                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Boolean form of [`assert_eventually`]
pub async fn assert_eventually_bool<F, Fut>(
    desc: &str,
    timeout: Duration,
    interval: Duration,
    mut f: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        if f().await {
            return;
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            panic!(
                "Timeout waiting for {}\n\
                 Duration: {:?}\n\
                 Attempts: {}\n\
                 Condition never became true",
                desc, elapsed, attempt
            );
        }

        tokio::time::sleep(interval).await;
    }
}
