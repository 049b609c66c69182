//! Fetch worker loop
//!
//! Each worker repeatedly pops a cursor, claims it, lists the page behind it
//! through the backoff policy, records the page's thread IDs and pushes the
//! follow-on cursor. Workers stop when the frontier closes; the orchestrator
//! decides when that happens.

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, Scope, ScopedJoinHandle};

use super::frontier::DoneGuard;
use super::{BackoffPolicy, CursorFrontier, FetchError, FetchOptions, ResultAccumulator};
use crate::gmail::{GmailError, ThreadLister};
use crate::models::Cursor;

/// Counters collected while the pool runs
#[derive(Debug, Default)]
pub struct PoolStats {
    pub(crate) pages_fetched: AtomicUsize,
    pub(crate) duplicates_skipped: AtomicUsize,
    pub(crate) branches_failed: AtomicUsize,
}

impl PoolStats {
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates_skipped.load(Ordering::Relaxed)
    }

    pub fn branches_failed(&self) -> usize {
        self.branches_failed.load(Ordering::Relaxed)
    }
}

/// Shared state and settings for a set of fetch workers
///
/// The frontier and accumulator are borrowed so their lifetime stays with
/// the orchestrator that created them.
pub struct WorkerPool<'a, L: ThreadLister + ?Sized> {
    lister: &'a L,
    frontier: &'a CursorFrontier,
    accumulator: &'a ResultAccumulator,
    policy: BackoffPolicy,
    page_size: u32,
    fail_fast: bool,
    first_failure: Mutex<Option<FetchError>>,
    stats: PoolStats,
}

impl<'a, L: ThreadLister + ?Sized> WorkerPool<'a, L> {
    pub fn new(
        lister: &'a L,
        frontier: &'a CursorFrontier,
        accumulator: &'a ResultAccumulator,
        options: &FetchOptions,
    ) -> Self {
        Self {
            lister,
            frontier,
            accumulator,
            policy: options.backoff(),
            page_size: options.page_size,
            fail_fast: options.fail_fast,
            first_failure: Mutex::new(None),
            stats: PoolStats::default(),
        }
    }

    /// Start `count` named worker threads inside `scope`
    ///
    /// If a thread fails to start, the frontier is closed so the workers
    /// already running exit and the scope can end.
    pub fn spawn_workers<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        count: usize,
    ) -> Result<Vec<ScopedJoinHandle<'scope, ()>>, FetchError> {
        let mut handles = Vec::with_capacity(count);
        for worker_id in 0..count {
            let spawned = thread::Builder::new()
                .name(format!("fetch-worker-{}", worker_id + 1))
                .spawn_scoped(scope, move || self.worker_loop(worker_id + 1));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.frontier.close();
                    return Err(FetchError::Spawn(e));
                }
            }
        }
        Ok(handles)
    }

    /// Run `count` workers until the frontier is quiescent, then shut them down
    ///
    /// Returns once every worker has been joined. In fail-fast mode the
    /// recorded failure is left for [`take_failure`](Self::take_failure).
    pub fn run(&self, count: usize) -> Result<(), FetchError> {
        thread::scope(|scope| {
            let handles = self.spawn_workers(scope, count)?;
            self.wait_idle();
            self.shutdown(handles)
        })
    }

    /// Block until the frontier is quiescent or closed early
    pub fn wait_idle(&self) {
        if !self.frontier.wait_quiescent() {
            warn!("Fetch aborted before all pages were processed");
        }
    }

    /// Close the frontier and join every worker
    ///
    /// A panicked worker is reported as [`FetchError::WorkerPanicked`].
    pub fn shutdown(&self, handles: Vec<ScopedJoinHandle<'_, ()>>) -> Result<(), FetchError> {
        self.frontier.close();

        let mut panicked = None;
        for (index, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("Fetch worker {} panicked", index + 1);
                panicked.get_or_insert(FetchError::WorkerPanicked(index + 1));
            }
        }
        panicked.map_or(Ok(()), Err)
    }

    /// Run one worker until the frontier closes
    pub fn worker_loop(&self, worker_id: usize) {
        debug!("Fetch worker {} started", worker_id);

        while let Some(cursor) = self.frontier.pop() {
            let _done = DoneGuard::new(self.frontier);

            if !self.frontier.claim(&cursor) {
                warn!(
                    "Worker {}: cursor {} already used, skipping",
                    worker_id, cursor
                );
                self.stats.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            debug!("Worker {}: fetching threads with cursor {}", worker_id, cursor);

            let result = self
                .policy
                .execute(|| self.lister.list_threads(Some(&cursor), self.page_size));

            match result {
                Ok(page) => {
                    self.stats.pages_fetched.fetch_add(1, Ordering::Relaxed);
                    let count = page.items.len();
                    self.accumulator.extend(page.items);

                    match page.next {
                        Some(next) => self.frontier.push(next),
                        None => info!(
                            "Worker {}: no more pages after cursor {} ({} threads)",
                            worker_id, cursor, count
                        ),
                    }
                }
                Err(err) => self.record_failure(worker_id, cursor, err),
            }
        }

        debug!("Fetch worker {} exiting", worker_id);
    }

    /// Drop the failed branch, or abort everything in fail-fast mode
    fn record_failure(&self, worker_id: usize, cursor: Cursor, source: GmailError) {
        self.stats.branches_failed.fetch_add(1, Ordering::Relaxed);
        let failure = FetchError::BranchFailed {
            cursor: Some(cursor),
            source,
        };

        if !self.fail_fast {
            error!(
                "Worker {}: {}; dropping this pagination branch",
                worker_id, failure
            );
            return;
        }

        error!("Worker {}: {}; aborting fetch", worker_id, failure);
        let mut slot = self
            .first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(failure);
        }
        drop(slot);
        self.frontier.close();
    }

    /// The first failure recorded in fail-fast mode, if any
    pub fn take_failure(&self) -> Option<FetchError> {
        self.first_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}
