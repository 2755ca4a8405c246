//! Bounded-parallelism job scheduling.
//!
//! Backup fans out one job per calendar day, restore one job per export
//! file; both run through [`run_bounded`], a semaphore-bounded task pool.
//! A slot frees as soon as its job finishes — there are no wave barriers,
//! so uneven job costs waste no concurrency slack — and at most
//! `parallelism` jobs (and hence outbound requests) are in flight at any
//! instant, which is the only backpressure applied toward the remote
//! service.

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Each day of the half-open interval `[start, end)`, in order.
///
/// The windows are contiguous and non-overlapping by construction, and
/// their union covers the interval exactly. `start == end` yields no
/// windows.
pub fn day_windows(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = start;
    while cursor < end {
        days.push(cursor);
        cursor = cursor.succ_opt().expect("date overflow");
    }
    days
}

/// Run one job per item with at most `parallelism` jobs in flight,
/// collecting every job's output in input order.
///
/// Jobs are infallible at this level: a job that can fail reports the
/// failure inside its output type, so one bad day or file never takes
/// down its siblings.
pub async fn run_bounded<I, O, F, Fut>(items: Vec<I>, parallelism: usize, job: F) -> Vec<O>
where
    O: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = O> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set: JoinSet<(usize, O)> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = job(item);
        set.spawn(async move {
            // Held for the job's whole lifetime; nothing in the body runs
            // until a slot is free.
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            (index, work.await)
        });
    }

    let total = set.len();
    let mut slots: Vec<Option<O>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = set.join_next().await {
        let (index, output) = joined.expect("scheduled job panicked");
        slots[index] = Some(output);
    }
    slots.into_iter().flatten().collect()
}
