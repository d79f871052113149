//! Bounded-concurrency execution of independent probe tasks.
//!
//! Tasks are plain futures; nothing runs until the stream polls them, so a
//! `Vec` of futures doubles as a list of deferred jobs. Results are written
//! into the slot of their input index, so callers see input order regardless
//! of completion order.

use std::future::Future;
use std::pin::pin;

use futures::stream::{self, StreamExt};

/// Result of [`run_bounded_until`].
#[derive(Debug)]
pub struct BoundedRun<T> {
    /// One slot per input task; `None` for tasks that were dropped before completing.
    pub results: Vec<Option<T>>,
    /// Whether the stop signal fired before every task completed.
    pub interrupted: bool,
}

impl<T> BoundedRun<T> {
    /// Completed results in input order.
    pub fn completed(self) -> impl Iterator<Item = T> {
        self.results.into_iter().flatten()
    }
}

/// Run `tasks` with at most `limit` in flight and return their outputs in input order.
///
/// A `limit` of zero is treated as one.
pub async fn run_bounded<T, F>(tasks: Vec<F>, limit: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let total = tasks.len();
    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();

    let mut stream = pin!(
        stream::iter(
            tasks
                .into_iter()
                .enumerate()
                .map(|(index, task)| async move { (index, task.await) }),
        )
        .buffer_unordered(limit.max(1))
    );

    while let Some((index, value)) = stream.next().await {
        slots[index] = Some(value);
    }

    slots.into_iter().flatten().collect()
}

/// Like [`run_bounded`], but stops as soon as `stop` resolves.
///
/// In-flight and unstarted tasks are dropped when the signal fires; their
/// slots stay `None`.
pub async fn run_bounded_until<T, F, S>(tasks: Vec<F>, limit: usize, stop: S) -> BoundedRun<T>
where
    F: Future<Output = T>,
    S: Future,
{
    let total = tasks.len();
    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();

    let mut stream = pin!(
        stream::iter(
            tasks
                .into_iter()
                .enumerate()
                .map(|(index, task)| async move { (index, task.await) }),
        )
        .buffer_unordered(limit.max(1))
        .take_until(stop)
    );

    while let Some((index, value)) = stream.next().await {
        results[index] = Some(value);
    }

    // An empty slot means the stop signal fired first.
    let interrupted = results.iter().any(Option::is_none);
    if interrupted {
        let done = results.iter().filter(|slot| slot.is_some()).count();
        log::debug!("[Runner] Stop signal fired after {done}/{total} tasks");
    }

    BoundedRun {
        results,
        interrupted,
    }
}
