//! Fetch-all orchestration
//!
//! A [`ThreadFetcher`] moves through four phases:
//! 1. Seeding: sequential listing calls, one per worker, the first without a
//!    cursor. Each call consumes the cursor it is given, so the cursor left
//!    over after the last call is the only one pushed to the frontier.
//! 2. Running: the worker pool drains the frontier.
//! 3. Draining: once the frontier is quiescent (or closed by a fail-fast
//!    abort) the pool closes it and joins every worker.
//! 4. Done: the deduplicated thread IDs are returned.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::cell::Cell;
use std::thread;
use std::time::Instant;

use super::{CursorFrontier, FetchError, FetchOptions, ResultAccumulator, WorkerPool};
use crate::gmail::ThreadLister;
use crate::models::{Cursor, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPhase {
    Created,
    Seeding,
    Running,
    Draining,
    Done,
}

/// One-shot fetch of every thread ID reachable through the listing API
///
/// `fetch_all` consumes the fetcher; start a new one for another run.
pub struct ThreadFetcher<'a, L: ThreadLister + ?Sized> {
    lister: &'a L,
    options: FetchOptions,
    frontier: CursorFrontier,
    accumulator: ResultAccumulator,
    phase: Cell<FetchPhase>,
}

impl<'a, L: ThreadLister + ?Sized> ThreadFetcher<'a, L> {
    pub fn new(lister: &'a L, options: FetchOptions) -> Self {
        Self {
            lister,
            options,
            frontier: CursorFrontier::new(),
            accumulator: ResultAccumulator::new(),
            phase: Cell::new(FetchPhase::Created),
        }
    }

    fn enter(&self, phase: FetchPhase) {
        debug!("Thread fetch: {:?} -> {:?}", self.phase.get(), phase);
        self.phase.set(phase);
    }

    fn worker_count(&self) -> usize {
        self.options.workers.max(1)
    }

    /// Fetch all thread IDs, deduplicated, in first-seen order
    ///
    /// Branch failures are logged and skipped unless `fail_fast` is set, in
    /// which case the first one is returned as a [`FetchError`] and no
    /// partial result is produced. A failure of the very first listing call
    /// is always returned.
    pub fn fetch_all(self) -> Result<Vec<ThreadId>> {
        let start = Instant::now();
        let workers = self.worker_count();
        info!(
            "Starting thread fetch with {} workers (page size {})",
            workers, self.options.page_size
        );

        self.enter(FetchPhase::Seeding);
        self.seed(workers)?;

        self.enter(FetchPhase::Running);
        info!("Seeded {} cursor(s); starting workers", self.frontier.pending());

        let pool = WorkerPool::new(
            self.lister,
            &self.frontier,
            &self.accumulator,
            &self.options,
        );

        thread::scope(|scope| -> Result<(), FetchError> {
            let handles = pool.spawn_workers(scope, workers)?;
            pool.wait_idle();
            self.enter(FetchPhase::Draining);
            pool.shutdown(handles)
        })?;

        if let Some(failure) = pool.take_failure() {
            return Err(failure.into());
        }

        let stats = pool.stats();
        let pages_fetched = stats.pages_fetched();
        let duplicates_skipped = stats.duplicates_skipped();
        let branches_failed = stats.branches_failed();
        drop(pool);

        self.enter(FetchPhase::Done);
        let listed = self.accumulator.len();
        let threads = self.accumulator.into_unique();

        info!(
            "Thread fetch complete: {} unique threads ({} listed), {} worker pages, {} duplicate cursors skipped, {} failed branches, {} ms",
            threads.len(),
            listed,
            pages_fetched,
            duplicates_skipped,
            branches_failed,
            start.elapsed().as_millis()
        );

        Ok(threads)
    }

    /// Issue the sequential seeding calls and push the leftover cursor
    fn seed(&self, workers: usize) -> Result<()> {
        let policy = self.options.backoff();
        let page_size = self.options.page_size;

        let first = policy
            .execute(|| self.lister.list_threads(None, page_size))
            .map_err(|source| FetchError::BranchFailed {
                cursor: None,
                source,
            })?;
        debug!("Seed page 1: {} threads", first.items.len());
        self.accumulator.extend(first.items);

        let mut next = first.next;
        for seed in 2..=workers {
            let Some(cursor) = next.take() else {
                break;
            };

            if !self.frontier.claim(&cursor) {
                warn!("Seeding: cursor {} repeated by the API, stopping", cursor);
                break;
            }

            let result = policy.execute(|| self.lister.list_threads(Some(&cursor), page_size));
            match result {
                Ok(page) => {
                    debug!("Seed page {}: {} threads", seed, page.items.len());
                    self.accumulator.extend(page.items);
                    next = page.next;
                }
                Err(source) => {
                    let failure = FetchError::BranchFailed {
                        cursor: Some(cursor),
                        source,
                    };
                    if self.options.fail_fast {
                        return Err(failure.into());
                    }
                    error!("Seeding: {}; dropping this pagination branch", failure);
                    break;
                }
            }
        }

        match next {
            Some(cursor) => self.push_seed(cursor),
            None => info!("No further pages after seeding"),
        }

        Ok(())
    }

    fn push_seed(&self, cursor: Cursor) {
        debug!("Seeding frontier with cursor {}", cursor);
        self.frontier.push(cursor);
    }
}

/// Fetch every thread ID through `lister` with the given options
pub fn fetch_all_threads<L: ThreadLister + ?Sized>(
    lister: &L,
    options: FetchOptions,
) -> Result<Vec<ThreadId>> {
    ThreadFetcher::new(lister, options).fetch_all()
}
