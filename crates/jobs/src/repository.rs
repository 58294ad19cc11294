use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use clone_wire::{Stage, ALL_STAGES, STAGE_COUNT};
use tracing::{debug, warn};

use crate::error::CloneError;

/// One unit of work handed to a worker thread: copy a file, stream a log
/// tail, and so on. Threads themselves are supplied by the host; this crate
/// never spawns its own.
///
/// Receives the error latched by whichever job ran before it in the same
/// task's draining loop (or `None` on the first job). A job that sees
/// `Some` must short-circuit and return it unchanged rather than emit bytes;
/// this is how an error propagates through the remaining queue without the
/// repository itself inspecting job internals.
pub type Job = Box<dyn FnOnce(&ThreadContext, Option<&CloneError>) -> Result<(), CloneError> + Send>;

/// Identity a worker thread carries while draining jobs from a
/// [`JobRepository`]. Cheap to construct per thread; does not own the
/// repository so a job closure can still take its own `Arc` reference to
/// one if it needs to enqueue follow-up work.
#[derive(Debug)]
pub struct ThreadContext {
    pub task_index: usize,
}

impl ThreadContext {
    #[must_use]
    pub fn new(task_index: usize) -> Self {
        Self { task_index }
    }
}

/// Cooperative cancellation hook the host implements over its own session
/// type. Polled rather than pushed: the repository has no way to interrupt
/// a thread mid-job, only to stop waiting on one.
pub trait Session {
    fn is_killed(&self) -> bool;
}

/// A `Session` that is never killed, for callers (tests, simple CLIs) with
/// no cancellation source of their own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverKilled;

impl Session for NeverKilled {
    fn is_killed(&self) -> bool {
        false
    }
}

struct Inner {
    queue: VecDeque<Job>,
    /// One slot per stage (including `End`); set once task 0 has scanned
    /// and enqueued every job for that stage.
    finished: [bool; STAGE_COUNT + 1],
    first_error: Option<CloneError>,
    pending: usize,
}

/// FIFO queue of jobs shared by every worker thread participating in one
/// clone, plus the bookkeeping needed to know when a stage is done and
/// whether anything has gone wrong.
///
/// Mirrors a single repository instance per clone: all tasks across all
/// stages share the same queue and error slot, so the first failure seen
/// by any task is the one every other task and the coordinator observe.
pub struct JobRepository {
    inner: Mutex<Inner>,
    activity: Condvar,
}

impl Default for JobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                finished: [false; STAGE_COUNT + 1],
                first_error: None,
                pending: 0,
            }),
            activity: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, CloneError> {
        self.inner.lock().map_err(|_| CloneError::lock_failed("job repository queue"))
    }

    /// Adds a job to the queue and wakes any thread blocked in
    /// [`Self::consume`].
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the mutex is poisoned.
    pub fn enqueue(&self, job: Job) -> Result<(), CloneError> {
        let mut guard = self.lock()?;
        guard.queue.push_back(job);
        guard.pending += 1;
        self.activity.notify_all();
        Ok(())
    }

    /// Marks `stage` as complete: task 0 has finished scanning and
    /// enqueueing its jobs. `err`, if set, becomes the repository's sticky
    /// first error unless one is already latched. Wakes every thread
    /// blocked in [`Self::consume`].
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the mutex is poisoned.
    pub fn finish(&self, stage: Stage, err: Option<CloneError>) -> Result<(), CloneError> {
        let mut guard = self.lock()?;
        guard.finished[stage.index()] = true;
        if let Some(e) = err {
            if guard.first_error.is_none() {
                warn!(error = %e, "first error recorded on job repository");
                guard.first_error = Some(e);
            }
        }
        self.activity.notify_all();
        debug!(%stage, "stage marked finished in job repository");
        Ok(())
    }

    /// Drains jobs until `stage` is finished and the queue is empty,
    /// threading `err` into the first job dequeued and each job's own
    /// result into the next.
    ///
    /// Mirrors the task-local drain loop every participating thread runs:
    /// while the target stage has not been marked finished, or the queue is
    /// non-empty, pop and run jobs; once a job (or a sibling task, via the
    /// repository's sticky error) reports a failure, stop draining early —
    /// remaining jobs were already given the chance to release anything
    /// they own by every job still having run up to that point.
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the mutex is poisoned.
    pub fn consume(
        &self,
        ctx: &ThreadContext,
        stage: Stage,
        mut err: Option<CloneError>,
        session: &dyn Session,
    ) -> Result<Option<CloneError>, CloneError> {
        let mut guard = self.lock()?;
        loop {
            while let Some(job) = guard.queue.pop_front() {
                drop(guard);
                let result = job(ctx, err.as_ref());
                err = if session.is_killed() {
                    Some(CloneError::cancelled("session killed while draining job queue"))
                } else {
                    result.err()
                };
                guard = self.lock()?;
                guard.pending = guard.pending.saturating_sub(1);
            }

            if guard.first_error.is_some() && err.is_none() {
                err = guard.first_error.clone();
                break;
            }
            if let Some(e) = err.clone() {
                if guard.first_error.is_none() {
                    guard.first_error = Some(e);
                }
                break;
            }
            if guard.finished[stage.index()] && guard.queue.is_empty() {
                break;
            }

            guard = self
                .activity
                .wait_timeout(guard, Duration::from_secs(1))
                .map_err(|_| CloneError::lock_failed("job repository queue"))?
                .0;
        }
        Ok(err)
    }

    /// The lowest stage not yet marked finished, the cursor a host-facing
    /// entry point resumes from. `None` once every stage (including `End`)
    /// has finished.
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the mutex is poisoned.
    pub fn last_finished_stage(&self) -> Result<Option<Stage>, CloneError> {
        let guard = self.lock()?;
        Ok(ALL_STAGES.iter().find(|s| !guard.finished[s.index()]).copied())
    }

    /// Sticky first error recorded by any job, if one occurred.
    ///
    /// # Errors
    /// Returns [`CloneError::LockFailed`] if the mutex is poisoned.
    pub fn first_error(&self) -> Result<Option<CloneError>, CloneError> {
        let guard = self.lock()?;
        Ok(guard.first_error.clone())
    }

    /// Polls until the pending-job count reaches zero, the session is
    /// killed, or a bounded number of one-second polls elapses.
    ///
    /// Used at finalize on the transactional path to make sure jobs
    /// enqueued for an earlier stage have actually finished running before
    /// the log tail is flushed and its header re-sent.
    ///
    /// # Errors
    /// Returns [`CloneError::Cancelled`] if `session` reports the operation
    /// killed, or [`CloneError::Capacity`] if the poll budget is exhausted
    /// while jobs remain pending.
    pub fn wait_pending(&self, session: &dyn Session) -> Result<(), CloneError> {
        const MAX_POLLS: u32 = 300;
        const POLL_INTERVAL: Duration = Duration::from_secs(1);

        for attempt in 0..MAX_POLLS {
            {
                let guard = self.lock()?;
                if guard.pending == 0 {
                    return Ok(());
                }
            }
            if session.is_killed() {
                return Err(CloneError::cancelled("session killed while waiting on pending jobs"));
            }
            if attempt + 1 < MAX_POLLS {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
        Err(CloneError::capacity("timed out waiting for pending jobs to drain"))
    }
}
