//! Bounded concurrency scheduler.
//!
//! Jobs are admitted in submission order, at most `max` at a time. Once the
//! in-flight count reaches the maximum the scheduler waits for every in-flight
//! job to finish before admitting the next batch. Each orchestration level
//! owns its own scheduler, and with it its own worker pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crossbeam::channel;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, SweepError};

pub struct BoundedScheduler {
    pool: ThreadPool,
    max: usize,
}

impl BoundedScheduler {
    /// A scheduler running at most `max` jobs at once. `max == 0` is a setup
    /// error.
    pub fn new(max: usize) -> Result<Self> {
        Self::named(max, "critsim")
    }

    /// Like [`new`](Self::new), naming worker threads `<name>-<i>`.
    pub fn named(max: usize, name: &str) -> Result<Self> {
        if max == 0 {
            return Err(critsim_core::Error::setup("scheduler width must be at least 1").into());
        }
        let prefix = name.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(max)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()?;
        Ok(Self { pool, max })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max
    }

    /// Run `f(index, job)` for every job and return the results in
    /// submission order.
    ///
    /// A panicking job yields [`SweepError::JobPanicked`] in its slot; its
    /// siblings are unaffected.
    pub fn run<T, R, F>(&self, jobs: Vec<T>, f: F) -> Vec<Result<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> R + Sync,
    {
        let total = jobs.len();
        let mut slots: Vec<Option<Result<R>>> = (0..total).map(|_| None).collect();
        let mut pending = jobs.into_iter().enumerate().peekable();
        let f = &f;

        while pending.peek().is_some() {
            let batch: Vec<(usize, T)> = pending.by_ref().take(self.max).collect();
            log::debug!(
                "admitting jobs {}..={} of {total}",
                batch[0].0,
                batch[batch.len() - 1].0
            );

            let (tx, rx) = channel::unbounded();
            self.pool.scope(|s| {
                for (index, job) in batch {
                    let tx = tx.clone();
                    s.spawn(move |_| {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(index, job)));
                        let _ = tx.send((index, outcome));
                    });
                }
            });
            drop(tx);

            for (index, outcome) in rx.try_iter() {
                slots[index] = Some(outcome.map_err(|payload| SweepError::JobPanicked {
                    index,
                    message: panic_message(payload.as_ref()),
                }));
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(SweepError::JobPanicked {
                        index,
                        message: "job produced no result".to_string(),
                    })
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for BoundedScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedScheduler")
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_width_is_setup_error() {
        let err = BoundedScheduler::new(0).unwrap_err();
        assert_eq!(err.kind(), critsim_core::ErrorKind::Setup);
    }

    #[test]
    fn test_results_in_submission_order() {
        let scheduler = BoundedScheduler::new(4).unwrap();
        let jobs: Vec<u64> = (0..10).collect();
        let results = scheduler.run(jobs, |_, n| {
            // Later jobs finish first.
            std::thread::sleep(Duration::from_millis(20 - 2 * n));
            n * n
        });
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn test_never_exceeds_width() {
        let scheduler = BoundedScheduler::new(3).unwrap();
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        scheduler.run((0..12).collect::<Vec<_>>(), |_, _: i32| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        assert!(max_seen.load(Ordering::SeqCst) <= 3);
        assert!(max_seen.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_barrier_between_batches() {
        let scheduler = BoundedScheduler::new(2).unwrap();
        let events = Mutex::new(Vec::new());

        scheduler.run((0..6).collect::<Vec<usize>>(), |index, _| {
            events.lock().unwrap().push(("start", index));
            std::thread::sleep(Duration::from_millis(5 * (index as u64 % 2 + 1)));
            events.lock().unwrap().push(("end", index));
        });

        // No job of batch k+1 starts before every job of batch k has ended.
        let events = events.into_inner().unwrap();
        for (pos, (kind, index)) in events.iter().enumerate() {
            if *kind == "start" {
                let batch = index / 2;
                for (k, i) in &events[pos..] {
                    if *k == "end" {
                        assert!(i / 2 >= batch, "job {i} ended after job {index} started");
                    }
                }
            }
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let scheduler = BoundedScheduler::new(2).unwrap();
        let results = scheduler.run(vec![1, 0, 3], |_, n: i32| {
            if n == 0 {
                panic!("division by zero");
            }
            10 / n
        });
        assert_eq!(*results[0].as_ref().unwrap(), 10);
        assert!(matches!(
            &results[1],
            Err(SweepError::JobPanicked { index: 1, message }) if message == "division by zero"
        ));
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[test]
    fn test_nested_schedulers() {
        let outer = BoundedScheduler::new(2).unwrap();
        let results = outer.run(vec![3usize, 4], |_, n| {
            let inner = BoundedScheduler::new(2).unwrap();
            inner
                .run((0..n).collect(), |_, i: usize| i)
                .into_iter()
                .map(|r| r.unwrap())
                .sum::<usize>()
        });
        assert_eq!(results[0].as_ref().unwrap(), &3);
        assert_eq!(results[1].as_ref().unwrap(), &6);
    }
}
